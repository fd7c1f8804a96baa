use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

const WATERMARK_MARGIN: u32 = 16;

/// Client for the AI image generation provider: prompt in, PNG bytes out.
pub struct ImageGenerator {
    base: String,
    http: reqwest::Client,
}

impl ImageGenerator {
    pub fn new(base: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base: base.into(),
            http,
        }
    }

    pub async fn generate(&self, prompt: &str) -> Result<Vec<u8>> {
        debug!("Generating image for prompt: {}", prompt);

        let encoded = utf8_percent_encode(prompt, NON_ALPHANUMERIC);
        let url = format!("{}/{}", self.base.trim_end_matches('/'), encoded);

        let response = self
            .http
            .get(&url)
            .query(&[("width", "1024"), ("height", "1024"), ("nologo", "true")])
            .send()
            .await
            .context("image generation request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("image generator returned HTTP {}", response.status());
        }

        Ok(response
            .bytes()
            .await
            .context("failed to read generated image")?
            .to_vec())
    }
}

/// Composite the watermark onto the bottom-right corner of the payload and
/// re-encode as PNG.
pub fn apply_watermark(payload: &[u8], watermark_path: &Path) -> Result<Vec<u8>> {
    let base = image::load_from_memory(payload).context("generated payload is not an image")?;
    let mark = image::open(watermark_path)
        .with_context(|| format!("failed to load watermark {}", watermark_path.display()))?;

    let mut canvas = base.to_rgba8();
    let mark = mark.to_rgba8();

    let x = canvas
        .width()
        .saturating_sub(mark.width() + WATERMARK_MARGIN);
    let y = canvas
        .height()
        .saturating_sub(mark.height() + WATERMARK_MARGIN);

    image::imageops::overlay(&mut canvas, &mark, i64::from(x), i64::from(y));

    encode_png(DynamicImage::ImageRgba8(canvas))
}

fn encode_png(image: DynamicImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(out)
}
