//! HTML rendering for the browser front end.

use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use html_escape::{encode_double_quoted_attribute, encode_text};
use image::RgbImage;
use std::fmt::Write;

use crate::acquire::{encode_jpeg, SUPPORTED_EXTENSIONS};
use crate::annotate::annotate;
use crate::config::UiSettings;
use crate::pipeline::{ClassificationOutcome, DetectionOutcome, ImageReport, RegionReport};
use crate::present::{bar_fraction, box_caption, headline};

pub const TITLE: &str = "Panoramic X-ray ROI Detection and Classification";
pub const NO_DETECTIONS_MESSAGE: &str =
    "No regions detected. Check if your workflow has a valid Detection Model linked.";
pub const COMPLETE_MESSAGE: &str = "Detection of ROI and classification complete!";

/// Caption offset above each box, in working-image pixels.
const CAPTION_OFFSET: u32 = 20;

const STYLE: &str = r#"
body { font-family: sans-serif; max-width: 960px; margin: 2em auto; color: #222; }
.banner { padding: .6em 1em; border-radius: 4px; margin: 1em 0; }
.success { background: #e6f4ea; color: #1e4620; }
.warning { background: #fff4e5; color: #663c00; }
.error { background: #fdecea; color: #611a15; }
.roi { border-top: 1px solid #ddd; padding: 1em 0; }
.bar { background: #eee; height: .8em; border-radius: 3px; margin: .2em 0 .6em; }
.bar > div { background: #1a73e8; height: 100%; border-radius: 3px; }
img, svg { max-width: 100%; }
"#;

const SCRIPT: &str = r#"
const input = document.getElementById('upload');
const results = document.getElementById('results');
input.addEventListener('change', async () => {
  const file = input.files[0];
  if (!file) { return; }
  results.innerHTML = '<p>Running detection...</p>';
  try {
    const resp = await fetch('/analyze?filename=' + encodeURIComponent(file.name), {
      method: 'POST',
      headers: { 'Content-Type': 'application/octet-stream' },
      body: file,
    });
    results.innerHTML = await resp.text();
  } catch (err) {
    results.innerHTML = '<div class="banner error">Upload failed: ' + err + '</div>';
  }
});
"#;

pub fn upload_page(settings: &UiSettings) -> String {
    let accept = SUPPORTED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>{STYLE}</style>
</head>
<body>
<h1>{title}</h1>
<p>Upload a panoramic X-ray image ({types}, up to {max_mb} MB).</p>
<input type="file" id="upload" accept="{accept}">
<div id="results"></div>
<script>{SCRIPT}</script>
</body>
</html>
"#,
        title = encode_text(TITLE),
        types = encode_text(&SUPPORTED_EXTENSIONS.join(", ")),
        max_mb = settings.max_upload_bytes / (1024 * 1024),
        accept = encode_double_quoted_attribute(&accept),
    )
}

pub fn error_fragment(message: &str) -> String {
    format!(r#"<div class="banner error">{}</div>"#, encode_text(message))
}

/// Results for one upload: resized image, status banner, annotated image
/// and one card per region.
pub fn results_fragment(
    file_name: &str,
    working: &RgbImage,
    report: &ImageReport,
) -> Result<String> {
    let mut html = String::new();
    writeln!(html, "<h2>Resized image</h2>")?;
    writeln!(
        html,
        r#"<img alt="{}" src="{}">"#,
        encode_double_quoted_attribute(file_name),
        jpeg_data_uri(working)?
    )?;

    let regions = match &report.outcome {
        DetectionOutcome::Failed(err) => {
            writeln!(html, "{}", error_fragment(&format!("Detection failed: {err}")))?;
            return Ok(html);
        }
        DetectionOutcome::NoDetections => {
            writeln!(
                html,
                r#"<div class="banner warning">{}</div>"#,
                encode_text(NO_DETECTIONS_MESSAGE)
            )?;
            return Ok(html);
        }
        DetectionOutcome::Regions(regions) => regions,
    };

    writeln!(
        html,
        r#"<div class="banner success">{} region(s) detected!</div>"#,
        report.detected
    )?;
    writeln!(html, "<h2>Detected regions</h2>")?;
    html.push_str(&annotated_svg(working, regions)?);

    for region in regions {
        html.push_str(&region_card(region)?);
    }

    writeln!(
        html,
        r#"<div class="banner success">{}</div>"#,
        encode_text(COMPLETE_MESSAGE)
    )?;
    Ok(html)
}

/// Outlined image with a text caption above each box. Captions are SVG
/// text so no font has to be rasterized.
fn annotated_svg(working: &RgbImage, regions: &[RegionReport]) -> Result<String> {
    let annotated = annotate(working, regions.iter().map(|r| &r.region.rect));
    let (width, height) = annotated.dimensions();
    let mut svg = String::new();
    writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {width} {height}" width="{width}" height="{height}">"#
    )?;
    writeln!(
        svg,
        r#"<image href="{}" width="{width}" height="{height}"/>"#,
        jpeg_data_uri(&annotated)?
    )?;
    for region in regions {
        let rect = region.region.rect;
        if rect.is_degenerate() {
            continue;
        }
        writeln!(
            svg,
            r#"<text x="{}" y="{}" dominant-baseline="hanging" fill="rgb(0,255,0)" font-size="14">{}</text>"#,
            rect.x1,
            rect.y1.saturating_sub(CAPTION_OFFSET),
            encode_text(&box_caption(region))
        )?;
    }
    svg.push_str("</svg>\n");
    Ok(svg)
}

fn region_card(region: &RegionReport) -> Result<String> {
    let mut card = String::new();
    writeln!(card, r#"<div class="roi">"#)?;
    writeln!(card, "<h3>ROI {}</h3>", region.index)?;

    match &region.classification {
        ClassificationOutcome::Degenerate => {
            writeln!(
                card,
                r#"<div class="banner warning">Region is empty after clamping to the image; skipped.</div>"#
            )?;
        }
        outcome => {
            writeln!(
                card,
                r#"<img alt="ROI {}" src="{}">"#,
                region.index,
                jpeg_data_uri(&region.region.image)?
            )?;
            match outcome {
                ClassificationOutcome::Classified(result) => {
                    writeln!(
                        card,
                        "<p><strong>Classified as:</strong> {}</p>",
                        encode_text(&headline(result))
                    )?;
                    for score in &result.per_class_scores {
                        let percent = bar_fraction(score.confidence) * 100.0;
                        writeln!(
                            card,
                            r#"<div>{}: {:.2}</div><div class="bar"><div style="width: {:.1}%"></div></div>"#,
                            encode_text(&score.label),
                            score.confidence,
                            percent
                        )?;
                    }
                }
                ClassificationOutcome::Failed(err) => {
                    writeln!(
                        card,
                        "{}",
                        error_fragment(&format!("Classification error: {err}"))
                    )?;
                }
                _ => {
                    writeln!(
                        card,
                        r#"<div class="banner warning">Could not classify this region.</div>"#
                    )?;
                }
            }
        }
    }

    writeln!(card, "</div>")?;
    Ok(card)
}

fn jpeg_data_uri(image: &RgbImage) -> Result<String> {
    let bytes = encode_jpeg(image)?;
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes)))
}
