use futures::future::join_all;
use std::sync::Arc;
use tracing::debug;

use crate::config::FaviconConfig;
use crate::host::{DecodeError, DecodedImage, FaviconDecoder};
use crate::models::{round_channel, GroupId, Rgb};

/// Mean color of the pixels that are opaque and bright enough to count.
///
/// `None` when no pixel passes both thresholds.
pub fn image_mean(image: &DecodedImage, thresholds: FaviconConfig) -> Option<Rgb> {
    let (mut r, mut g, mut b, mut n) = (0u64, 0u64, 0u64, 0u64);
    for px in image.pixels() {
        let brightness = px[0] as u16 + px[1] as u16 + px[2] as u16;
        if px[3] <= thresholds.min_alpha || brightness <= thresholds.min_brightness {
            continue;
        }
        r += px[0] as u64;
        g += px[1] as u64;
        b += px[2] as u64;
        n += 1;
    }
    if n == 0 {
        return None;
    }

    let n = n as f64;
    Some(Rgb::new(
        round_channel(r as f64 / n),
        round_channel(g as f64 / n),
        round_channel(b as f64 / n),
    ))
}

/// Result of a favicon job once every member image has settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaviconSummary {
    pub group: GroupId,
    /// Average of the per-image means; `None` leaves the group color alone.
    pub color: Option<Rgb>,
    pub usable: usize,
    pub failed: usize,
    pub total: usize,
}

/// Decode every source and average the usable images.
///
/// Resolves exactly once, after all sources have settled; a missing source
/// settles immediately as a failure.
pub async fn average_favicon_color(
    decoder: Arc<dyn FaviconDecoder>,
    group: GroupId,
    sources: Vec<Option<String>>,
    thresholds: FaviconConfig,
) -> FaviconSummary {
    let total = sources.len();
    let settled = join_all(sources.into_iter().map(|src| {
        let decoder = decoder.clone();
        async move {
            let src = src.ok_or(DecodeError::Missing)?;
            let image = decoder.decode(&src).await?;
            Ok::<_, DecodeError>(image_mean(&image, thresholds))
        }
    }))
    .await;

    let mut means = Vec::with_capacity(total);
    let mut failed = 0;
    for result in settled {
        match result {
            Ok(Some(mean)) => means.push(mean),
            Ok(None) => {}
            Err(e) => {
                debug!("Favicon of group {} skipped: {}", group, e);
                failed += 1;
            }
        }
    }

    FaviconSummary {
        color: Rgb::average(&means),
        usable: means.len(),
        failed,
        total,
        group,
    }
}
