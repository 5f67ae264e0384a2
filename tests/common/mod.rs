//! Shared test fixtures

use std::path::PathBuf;

use wynbot::Config;
use wynbot::config::{AuthConfig, CONFIG_FILE};

/// A takeout-shaped archive with one conversation, one unpunctuated message
#[must_use]
pub fn single_message_archive(conversation: &str, text: &str, timestamp_us: i64) -> String {
    format!(
        r#"{{
            "conversation_state": [
                {{
                    "conversation_state": {{
                        "conversation_id": {{"id": "{conversation}"}},
                        "event": [
                            {{
                                "conversation_id": {{"id": "{conversation}"}},
                                "timestamp": "{timestamp_us}",
                                "chat_message": {{
                                    "message_content": {{
                                        "segment": [{{"type": "TEXT", "text": "{text}"}}]
                                    }}
                                }}
                            }}
                        ]
                    }}
                }}
            ]
        }}"#
    )
}

/// Write a config file with the given refresh token into `dir`
#[must_use]
pub fn write_config(dir: &std::path::Path, refresh_token: &str) -> PathBuf {
    let config = Config {
        auth: AuthConfig {
            client_id: "test-client".into(),
            client_secret: "test-secret".into(),
            refresh_token: refresh_token.into(),
        },
        paths: wynbot::config::PathsConfig::default(),
    };
    let path = dir.join(CONFIG_FILE);
    config.store(&path).expect("failed to write test config");
    path
}
