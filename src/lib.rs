pub mod association;
pub mod collision;
pub mod config;
mod error;
pub mod geometry;
pub mod grouping;
pub mod mirror;
pub mod model;
pub mod pipeline;
pub mod pptx;
pub mod report;
pub mod text;
pub mod translate;
pub mod xml;

pub use config::Config;
pub use error::{Error, SlideError, TranslateError};
pub use report::{ConversionReport, LayoutReport, SlideReport, TranslationStatus};
pub use translate::{GlossaryTranslator, Translator};

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn log_timing(load: Duration, translate: Duration, transform: Duration, save: Duration, bytes: usize) {
    log::info!(
        "Timing: load={:.1}ms, translate={:.1}ms, transform={:.1}ms, save={:.1}ms, total={:.1}ms (output {} bytes)",
        load.as_secs_f64() * 1000.0,
        translate.as_secs_f64() * 1000.0,
        transform.as_secs_f64() * 1000.0,
        save.as_secs_f64() * 1000.0,
        (load + translate + transform + save).as_secs_f64() * 1000.0,
        bytes,
    );
}

/// Mirror the layout of `input` into RTL and write it to `output`. Text stays as is apart
/// from right alignment.
pub fn convert_pptx_to_rtl(input: &Path, output: &Path, cfg: &Config) -> Result<ConversionReport, Error> {
    let t0 = Instant::now();
    let mut doc = pptx::load(input)?;
    let t_load = t0.elapsed();

    let report = pipeline::transform_document(&mut doc, Vec::new(), cfg);
    let t_transform = t0.elapsed();

    let bytes = doc.to_bytes()?;
    std::fs::write(output, &bytes).map_err(Error::Io)?;
    let t_total = t0.elapsed();

    log_timing(t_load, Duration::ZERO, t_transform - t_load, t_total - t_transform, bytes.len());
    Ok(report)
}

/// Mirror `input` into RTL and replace its text, slide layouts included, with translations
/// from `translator`.
pub async fn translate_pptx_to_rtl_async<T: Translator + 'static>(
    input: &Path,
    output: &Path,
    translator: Arc<T>,
    cfg: &Config,
) -> Result<ConversionReport, Error> {
    let t0 = Instant::now();
    let mut doc = pptx::load(input)?;
    let t_load = t0.elapsed();

    let translations = pipeline::translate_slides(&doc, Arc::clone(&translator), cfg).await;
    let layout_translations = pipeline::translate_layouts(&doc, translator, cfg).await;
    let t_translate = t0.elapsed();

    let mut report = pipeline::transform_document(&mut doc, translations, cfg);
    report.layouts = pipeline::apply_layout_translations(&mut doc, layout_translations);
    let t_transform = t0.elapsed();

    let bytes = doc.to_bytes()?;
    std::fs::write(output, &bytes).map_err(Error::Io)?;
    let t_total = t0.elapsed();

    log_timing(
        t_load,
        t_translate - t_load,
        t_transform - t_translate,
        t_total - t_transform,
        bytes.len(),
    );
    Ok(report)
}

/// Blocking wrapper around [`translate_pptx_to_rtl_async`] on its own runtime.
pub fn translate_pptx_to_rtl<T: Translator + 'static>(
    input: &Path,
    output: &Path,
    translator: Arc<T>,
    cfg: &Config,
) -> Result<ConversionReport, Error> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cfg.max_workers.max(1))
        .enable_time()
        .build()?;
    runtime.block_on(translate_pptx_to_rtl_async(input, output, translator, cfg))
}
