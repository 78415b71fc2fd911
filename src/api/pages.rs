//! HTML pages shown at the end of the OAuth callback.

use maud::{html, Markup, DOCTYPE};

/// Seconds before the confirmation page returns to the application.
pub const REDIRECT_DELAY_SECONDS: u32 = 3;

fn layout(title: &str, head_extra: Markup, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                (head_extra)
                style {
                    "body { font-family: system-ui, sans-serif; display: flex; justify-content: center; padding-top: 4rem; }"
                    "main { max-width: 28rem; text-align: center; }"
                    ".error { color: #b3261e; }"
                }
            }
            body {
                main { (body) }
            }
        }
    }
}

pub fn connected_page(site_name: &str) -> Markup {
    let refresh = format!("{};url=/", REDIRECT_DELAY_SECONDS);
    layout(
        "Connected to Jira",
        html! { meta http-equiv="refresh" content=(refresh); },
        html! {
            h1 { "Connected to Jira" }
            p { "Your account is now connected to " strong { (site_name) } "." }
            p { "Returning to the app in " (REDIRECT_DELAY_SECONDS) " seconds…" }
            a href="/" { "Continue now" }
        },
    )
}

pub fn error_page(reason: &str) -> Markup {
    layout(
        "Jira connection failed",
        html! {},
        html! {
            h1.error { "Connection failed" }
            p { (reason) }
            a href="/" { "Back to the app" }
        },
    )
}
