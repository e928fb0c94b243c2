use crate::error::{Error, Result};
use reqwest::Url;

const QR_SERVICE_URL: &str = "https://api.qrserver.com/v1/create-qr-code/";

/// QR code pointing people at the voting page. The image itself comes from
/// an external service; we only build its URL.
#[derive(Debug, Clone)]
pub struct QrPanel {
    app_url: String,
    image_url: Url,
    visible: bool,
}

impl QrPanel {
    pub fn new(app_url: &str, size: u32) -> Result<Self> {
        let dimensions = format!("{}x{}", size, size);
        let image_url = Url::parse_with_params(
            QR_SERVICE_URL,
            &[("size", dimensions.as_str()), ("data", app_url)],
        )
        .map_err(|e| Error::Config(format!("QR code URL: {}", e)))?;

        Ok(Self {
            app_url: app_url.to_string(),
            image_url,
            visible: false,
        })
    }

    pub fn app_url(&self) -> &str {
        &self.app_url
    }

    pub fn image_url(&self) -> &Url {
        &self.image_url
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    pub fn show(&mut self) {
        self.visible = true;
    }

    // Label for the toggle button
    pub fn toggle_label(&self) -> &'static str {
        if self.visible { "Hide QR Code" } else { "Show QR Code" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_encoded_image_url() {
        let panel = QrPanel::new("https://vote.example.org/talk?id=7", 300).unwrap();
        assert_eq!(
            panel.image_url().as_str(),
            "https://api.qrserver.com/v1/create-qr-code/?size=300x300&data=https%3A%2F%2Fvote.example.org%2Ftalk%3Fid%3D7"
        );
        assert_eq!(panel.app_url(), "https://vote.example.org/talk?id=7");
    }

    #[test]
    fn toggling_flips_visibility_and_label() {
        let mut panel = QrPanel::new("http://localhost/", 300).unwrap();
        assert!(!panel.is_visible());
        assert_eq!(panel.toggle_label(), "Show QR Code");

        panel.toggle();
        assert!(panel.is_visible());
        assert_eq!(panel.toggle_label(), "Hide QR Code");

        panel.show();
        assert!(panel.is_visible());
        panel.toggle();
        assert!(!panel.is_visible());
    }
}
