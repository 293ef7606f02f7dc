//! Rendering credentials for the terminal.

use crate::credentials::CredentialBundle;
use serde::Serialize;

/// JSON shape printed by `k3t up --json`.
#[derive(Debug, Serialize)]
pub struct CredentialOutput {
    pub server: String,
    pub certificate_authority: String,
    pub client_certificate: String,
    pub client_key: String,
}

impl CredentialOutput {
    pub fn new(server: &str, bundle: &CredentialBundle) -> Self {
        Self {
            server: server.to_string(),
            certificate_authority: String::from_utf8_lossy(&bundle.certificate_authority)
                .into_owned(),
            client_certificate: String::from_utf8_lossy(&bundle.client_certificate).into_owned(),
            client_key: String::from_utf8_lossy(&bundle.client_key).into_owned(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Plain text: the server URL followed by each PEM block under a heading.
    pub fn to_text(&self) -> String {
        let mut out = format!("server: {}\n", self.server);
        for (label, pem) in [
            ("certificate authority", &self.certificate_authority),
            ("client certificate", &self.client_certificate),
            ("client key", &self.client_key),
        ] {
            out.push_str(&format!("\n# {}\n{}", label, pem));
            if !pem.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output() -> CredentialOutput {
        CredentialOutput::new(
            "https://127.0.0.1:7443",
            &CredentialBundle {
                certificate_authority: b"CA PEM\n".to_vec(),
                client_certificate: b"CERT PEM".to_vec(),
                client_key: b"KEY PEM\n".to_vec(),
            },
        )
    }

    #[test]
    fn test_json_fields() {
        let value: serde_json::Value = serde_json::from_str(&output().to_json().unwrap()).unwrap();
        assert_eq!(value["server"], "https://127.0.0.1:7443");
        assert_eq!(value["client_certificate"], "CERT PEM");
        assert_eq!(value["client_key"], "KEY PEM\n");
    }

    #[test]
    fn test_text_layout() {
        let text = output().to_text();
        assert!(text.starts_with("server: https://127.0.0.1:7443\n"));
        assert!(text.contains("# client certificate\nCERT PEM\n"));
        assert!(text.ends_with("# client key\nKEY PEM\n"));
    }
}
