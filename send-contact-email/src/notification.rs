use crate::contact_message::ContactMessage;
use serde::Serialize;
use serde_json::Value;
use tinytemplate::{error::Error, format, TinyTemplate};

const CONTACT_NOTIFICATION_TEMPLATE_NAME: &str = "contact-notification";
const CONTACT_NOTIFICATION_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/contact-notification.html"
));

#[derive(Serialize)]
struct Context<'a> {
    name: &'a str,
    email: &'a str,
    subject: &'a str,
    message: &'a str,
}

/// Renders the HTML notification sent to the site owner for a contact message.
///
/// Every field is passed through [`escape_html`] before it is placed in the document.
pub fn render_contact_notification(message: &ContactMessage) -> String {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&escape_field);
    tt.add_template(
        CONTACT_NOTIFICATION_TEMPLATE_NAME,
        CONTACT_NOTIFICATION_TEMPLATE,
    )
    .expect("contact notification template must parse");
    let context = Context {
        name: message.name(),
        email: message.email(),
        subject: message.subject(),
        message: message.message(),
    };
    tt.render(CONTACT_NOTIFICATION_TEMPLATE_NAME, &context)
        .expect("contact notification context only holds strings")
}

/// Replaces `&`, `<`, `>`, `"` and `'` with their HTML entities.
///
/// This is a single pass over the input, so entities produced here are never escaped a
/// second time within one call. Applying it again to its own output does escape the `&`
/// of every entity.
pub fn escape_html(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#39;"),
            _ => output.push(c),
        }
    }
    output
}

fn escape_field(value: &Value, output: &mut String) -> Result<(), Error> {
    match value {
        Value::Null => {}
        Value::String(s) => output.push_str(&escape_html(s)),
        _ => {
            let mut formatted = String::new();
            format(value, &mut formatted)?;
            output.push_str(&escape_html(&formatted));
        }
    }
    Ok(())
}
