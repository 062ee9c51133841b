use ammonia::{Builder, UrlRelative};

const TICKET_NOTIFICATION_TEMPLATE: &str = include_str!("templates/Ticket-notification.html");

/// Strips markup from user-controlled text before it lands in a template.
/// Only a handful of inline tags survive.
pub fn sanitize_html(input: &str) -> String {
    let mut builder = Builder::default();

    builder
        .tags(["p", "br", "strong", "em", "u", "a"].into_iter().collect())
        .add_tag_attributes("a", &["href"])
        .url_relative(UrlRelative::PassThrough)
        .link_rel(None);

    builder.clean(input).to_string()
}

pub fn create_ticket_link(app_url: &str, ticket_id: &str) -> String {
    format!("{}/tickets/{}", app_url.trim_end_matches('/'), ticket_id)
}

/// Subject and HTML body for a ticket notification email.
pub fn ticket_notification_email(
    username: &str,
    title: &str,
    body: &str,
    ticket_title: &str,
    ticket_link: &str,
) -> (String, String) {
    let placeholders = [
        ("{{username}}", sanitize_html(username)),
        ("{{title}}", sanitize_html(title)),
        ("{{body}}", sanitize_html(body)),
        ("{{ticket_title}}", sanitize_html(ticket_title)),
        ("{{ticket_link}}", ticket_link.to_string()),
    ];

    let mut html = TICKET_NOTIFICATION_TEMPLATE.to_string();
    for (key, value) in placeholders.iter() {
        html = html.replace(key, value);
    }

    (title.to_string(), html)
}
