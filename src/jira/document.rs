//! Atlassian Document Format (ADF) bodies for rich-text fields.

use serde_json::{json, Value};

/// Wraps plain text in a single-paragraph ADF document.
pub fn paragraph_document(text: &str) -> Value {
    json!({
        "type": "doc",
        "version": 1,
        "content": [
            {
                "type": "paragraph",
                "content": [
                    {
                        "type": "text",
                        "text": text
                    }
                ]
            }
        ]
    })
}
