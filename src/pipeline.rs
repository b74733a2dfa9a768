use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::association;
use crate::collision::resolve_collisions;
use crate::config::Config;
use crate::error::{SlideError, TranslateError};
use crate::geometry::Emu;
use crate::grouping::synthesize_groups;
use crate::mirror::{align_paragraphs_rtl, mirror_slide};
use crate::model::Replacement;
use crate::pptx::{Document, Slide};
use crate::report::{ConversionReport, LayoutReport, SlideReport, TranslationStatus};
use crate::text::replace_text;
use crate::translate::{
    BatchRequest, BatchResponse, Element, Translator, extract_elements, extract_layout_elements,
    normalize,
};

/// Elements sent in one batch and what came back.
#[derive(Clone, Debug)]
pub struct TranslatedBatch {
    pub elements: Vec<Element>,
    pub outcome: Result<BatchResponse, TranslateError>,
}

async fn translate_one<T: Translator>(
    translator: &T,
    request: BatchRequest,
    timeout: Duration,
) -> Result<BatchResponse, TranslateError> {
    match tokio::time::timeout(timeout, translator.translate_batch(request)).await {
        Ok(result) => result,
        Err(_) => Err(TranslateError::Timeout(timeout)),
    }
}

/// Run one call per non-empty batch, at most `cfg.max_workers` in flight. The result is
/// indexed like `batches`; `None` means that slot had nothing to translate. A failed or
/// timed-out call only affects its own slot.
async fn translate_batches<T: Translator + 'static>(
    label: &'static str,
    batches: Vec<Vec<Element>>,
    translator: Arc<T>,
    cfg: &Config,
) -> Vec<Option<TranslatedBatch>> {
    let total = batches.len();
    let mut results: Vec<Option<TranslatedBatch>> = vec![None; total];
    let busy = batches.iter().filter(|b| !b.is_empty()).count();
    if busy == 0 {
        return results;
    }

    let workers = busy.min(cfg.max_workers).max(1);
    log::info!("Translating {busy} {label}(s) with {workers} worker(s)");
    let permits = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();
    let mut pending: Vec<Option<Vec<Element>>> = vec![None; total];

    for (index, elements) in batches.into_iter().enumerate() {
        if elements.is_empty() {
            continue;
        }
        let request = BatchRequest {
            elements: elements.clone(),
            source_lang: cfg.source_lang.clone(),
            target_lang: cfg.target_lang.clone(),
        };
        pending[index] = Some(elements);
        let translator = Arc::clone(&translator);
        let permits = Arc::clone(&permits);
        let timeout = cfg.translation_timeout;
        tasks.spawn(async move {
            let start = Instant::now();
            let outcome = match permits.acquire_owned().await {
                Ok(_permit) => translate_one(translator.as_ref(), request, timeout).await,
                Err(_) => Err(TranslateError::Service("worker pool closed".into())),
            };
            log::info!(
                "[{label} {}/{total}] translation {} in {:.1}s",
                index + 1,
                if outcome.is_ok() { "done" } else { "failed" },
                start.elapsed().as_secs_f64()
            );
            (index, outcome)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => {
                if let Some(elements) = pending[index].take() {
                    results[index] = Some(TranslatedBatch { elements, outcome });
                }
            }
            Err(e) => log::error!("Translation task aborted: {e}"),
        }
    }

    // slots whose task died never reported back
    for (index, elements) in pending.into_iter().enumerate() {
        if let Some(elements) = elements {
            results[index] = Some(TranslatedBatch {
                elements,
                outcome: Err(TranslateError::Service("translation task aborted".into())),
            });
        }
    }
    results
}

/// Translate every slide that has text. The result is indexed by slide.
pub async fn translate_slides<T: Translator + 'static>(
    doc: &Document,
    translator: Arc<T>,
    cfg: &Config,
) -> Vec<Option<TranslatedBatch>> {
    let batches = doc.slides.iter().map(extract_elements).collect();
    translate_batches("Slide", batches, translator, cfg).await
}

/// Translate the text of every slide layout, one call per layout. The result is indexed
/// like `doc.layouts`.
pub async fn translate_layouts<T: Translator + 'static>(
    doc: &Document,
    translator: Arc<T>,
    cfg: &Config,
) -> Vec<Option<TranslatedBatch>> {
    let batches = doc
        .layouts
        .iter()
        .map(|l| extract_layout_elements(l).into_iter().map(|(_, el)| el).collect())
        .collect();
    translate_batches("Layout", batches, translator, cfg).await
}

/// Write layout translations back. Runs the service did not answer keep their text, and a
/// failed call leaves the whole layout untouched.
pub fn apply_layout_translations(
    doc: &mut Document,
    translations: Vec<Option<TranslatedBatch>>,
) -> Vec<LayoutReport> {
    let mut reports = Vec::new();
    for (layout, translation) in doc.layouts.iter_mut().zip(translations) {
        let Some(TranslatedBatch { elements, outcome }) = translation else {
            continue;
        };
        let mut report = LayoutReport {
            part: layout.part_name.clone(),
            ..LayoutReport::default()
        };
        match outcome {
            Err(e) => {
                log::warn!("{}: layout translation failed: {e}", layout.part_name);
                report.translation = TranslationStatus::Failed {
                    reason: e.to_string(),
                };
            }
            Ok(mut response) => {
                let nodes: Vec<_> = extract_layout_elements(layout)
                    .into_iter()
                    .map(|(node, el)| (el.id, node))
                    .collect();
                let mut missing = Vec::new();
                for el in &elements {
                    let node = nodes.iter().find(|(id, _)| *id == el.id).map(|(_, n)| *n);
                    let text = match response.remove(&el.id) {
                        Some(Replacement::Text(t)) => t,
                        Some(Replacement::Paragraphs(items)) => items.join(" "),
                        None => {
                            missing.push(el.id.clone());
                            continue;
                        }
                    };
                    if let Some(node) = node {
                        layout.set_text(node, &text);
                        report.texts_translated += 1;
                    }
                }
                report.translation = if missing.is_empty() {
                    TranslationStatus::Complete
                } else {
                    TranslationStatus::Partial { missing }
                };
            }
        }
        log::info!(
            "{}: {} layout text(s) translated",
            report.part,
            report.texts_translated
        );
        reports.push(report);
    }
    reports
}

fn replace_slide_text(
    slide: &mut Slide,
    translation: TranslatedBatch,
    cfg: &Config,
    report: &mut SlideReport,
) -> Result<(), SlideError> {
    let normalized = normalize(&translation.elements, translation.outcome);
    report.translation = match (&normalized.failure, normalized.missing.is_empty()) {
        (Some(reason), _) => TranslationStatus::Failed {
            reason: reason.clone(),
        },
        (None, false) => TranslationStatus::Partial {
            missing: normalized.missing.clone(),
        },
        (None, true) => TranslationStatus::Complete,
    };
    if let TranslationStatus::Failed { reason } = &report.translation {
        log::warn!("Slide {}: translation failed: {reason}", slide.index + 1);
    }

    for (id, replacement) in normalized.replacements {
        let target = slide
            .all_shapes()
            .into_iter()
            .find(|&n| slide.stable_id(n).as_str() == id);
        let Some(node) = target else {
            report.structural_skips.push(format!("{id}: shape not found for replacement"));
            continue;
        };
        match replace_text(slide, node, replacement, cfg) {
            Ok(_) => report.shapes_translated += 1,
            Err(SlideError::Structural(msg)) => {
                log::warn!("Slide {}: {msg}", slide.index + 1);
                report.structural_skips.push(msg);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn run_stages(
    slide: &mut Slide,
    slide_width: Emu,
    translation: Option<TranslatedBatch>,
    cfg: &Config,
    report: &mut SlideReport,
) -> Result<(), SlideError> {
    let map = association::resolve(&slide.shapes());
    report.groups_created = synthesize_groups(slide, &map)?;

    let mirrored = mirror_slide(slide, slide_width, cfg)?;
    report.shapes_mirrored = mirrored.mirrored;
    report.skipped_near_chart = mirrored.skipped_near_chart;
    report.clamped = mirrored.clamped;
    report.structural_skips.extend(mirrored.structural_skips);
    report.paragraphs_aligned = align_paragraphs_rtl(slide);

    let collisions = resolve_collisions(slide, slide_width, cfg.min_spacing)?;
    report.collisions_fixed = collisions.fixed;
    report.unresolved_collisions = collisions.unresolved;

    if let Some(translation) = translation {
        replace_slide_text(slide, translation, cfg, report)?;
    }
    Ok(())
}

/// Run the structural stages on one slide. A schema error rolls the slide back to its
/// input state and is recorded in the report; it never propagates.
pub fn transform_slide(
    slide: &mut Slide,
    slide_width: Emu,
    translation: Option<TranslatedBatch>,
    cfg: &Config,
) -> SlideReport {
    let mut report = SlideReport {
        slide: slide.index + 1,
        ..SlideReport::default()
    };
    let backup = slide.clone();
    if let Err(e) = run_stages(slide, slide_width, translation, cfg, &mut report) {
        log::warn!("Slide {}: {e}; slide left unchanged", slide.index + 1);
        *slide = backup;
        report = SlideReport {
            slide: report.slide,
            schema_error: Some(e.to_string()),
            ..SlideReport::default()
        };
    }
    log::info!(
        "Slide {}: {} group(s), {} mirrored, {} collision(s) fixed, {} translated",
        report.slide,
        report.groups_created,
        report.shapes_mirrored,
        report.collisions_fixed,
        report.shapes_translated
    );
    report
}

/// Sequentially transform every slide of the document.
pub fn transform_document(
    doc: &mut Document,
    translations: Vec<Option<TranslatedBatch>>,
    cfg: &Config,
) -> ConversionReport {
    let width = doc.width;
    let mut translations = translations.into_iter();
    let slides = doc
        .slides
        .iter_mut()
        .map(|slide| transform_slide(slide, width, translations.next().flatten(), cfg))
        .collect();
    ConversionReport {
        slides,
        layouts: Vec::new(),
    }
}
