use crate::automation::templates::Pattern;
use image::{imageops, GrayImage, ImageBuffer, Luma};
use imageproc::integral_image::{integral_image, integral_squared_image};
use imageproc::template_matching::{match_template, MatchTemplateMethod};

/// Minimum confidence for a primary (click) target.
pub const PRIMARY_THRESHOLD: f32 = 0.80;
/// Minimum confidence for a secondary (kick) target. Stricter than primary.
pub const SECONDARY_THRESHOLD: f32 = 0.85;

/// Best location of a pattern on a screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Located {
    /// Similarity in [0, 1]
    pub confidence: f32,
    pub top_left: (u32, u32),
}

/// A located pattern, ready to be acted on.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub id: String,
    pub top_left: (u32, u32),
    pub confidence: f32,
    pub center: (u32, u32),
}

impl MatchResult {
    pub fn new(pattern: &Pattern, located: Located) -> Self {
        let (x, y) = located.top_left;
        Self {
            id: pattern.id().to_string(),
            top_left: located.top_left,
            confidence: located.confidence,
            // Integer division truncates toward the top-left.
            center: (x + pattern.width() / 2, y + pattern.height() / 2),
        }
    }
}

pub fn meets_threshold(confidence: f32, threshold: f32) -> bool {
    confidence >= threshold
}

/// Finds where a pattern best matches a captured screen.
pub trait MatchEngine: Send + Sync {
    /// `None` when the pattern cannot be placed on the screen at all.
    fn locate(&self, screen: &GrayImage, pattern: &Pattern) -> Option<Located>;
}

/// Zero-mean normalized cross-correlation with a coarse-to-fine search.
///
/// Correlation sums come from `imageproc`; window means and variances from
/// integral images. Negative correlation is reported as 0 and flat
/// (zero-variance) windows or patterns score 0.
///
/// Patterns large enough to survive downscaling are first searched on a
/// shrunken copy of the screen; the best few coarse peaks are then re-scored
/// at full resolution in a small window around each. The reported confidence
/// always comes from the full-resolution pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct NccMatchEngine;

const FLAT_VARIANCE: f64 = 1e-6;
/// Short side of the pattern on the coarse level, in pixels.
const MIN_COARSE_SIDE: u32 = 6;
const MAX_SCALE: u32 = 8;
/// Coarse peaks re-scored at full resolution.
const REFINE_CANDIDATES: usize = 3;

type ScoreMap = ImageBuffer<Luma<f32>, Vec<f32>>;

fn window_sum(integral: &ImageBuffer<Luma<u64>, Vec<u64>>, x: u32, y: u32, w: u32, h: u32) -> f64 {
    let at = |px: u32, py: u32| integral.get_pixel(px, py)[0];
    ((at(x + w, y + h) + at(x, y)) - (at(x, y + h) + at(x + w, y))) as f64
}

/// ZNCC score for every placement of `pattern` on `screen`.
/// `None` when the pattern itself is flat.
fn zncc_scores(screen: &GrayImage, pattern: &GrayImage) -> Option<ScoreMap> {
    let (pw, ph) = pattern.dimensions();
    let n = f64::from(pw) * f64::from(ph);
    let (t_sum, t_sq_sum) = pattern.pixels().fold((0.0, 0.0), |(s, sq), p| {
        let v = f64::from(p[0]);
        (s + v, sq + v * v)
    });
    let t_var = t_sq_sum - t_sum * t_sum / n;
    if t_var <= FLAT_VARIANCE {
        return None;
    }

    let cross = match_template(screen, pattern, MatchTemplateMethod::CrossCorrelation);
    let sums = integral_image::<_, u64>(screen);
    let squares = integral_squared_image::<_, u64>(screen);

    let mut scores = ScoreMap::new(cross.width(), cross.height());
    for (x, y, corr) in cross.enumerate_pixels() {
        let w_sum = window_sum(&sums, x, y, pw, ph);
        let w_var = window_sum(&squares, x, y, pw, ph) - w_sum * w_sum / n;
        let score = if w_var <= FLAT_VARIANCE {
            0.0
        } else {
            (f64::from(corr[0]) - w_sum * t_sum / n) / (w_var * t_var).sqrt()
        };
        scores.put_pixel(x, y, Luma([score as f32]));
    }
    Some(scores)
}

fn best_of(scores: &ScoreMap) -> (f32, (u32, u32)) {
    let mut best = (f32::NEG_INFINITY, (0, 0));
    for (x, y, score) in scores.enumerate_pixels() {
        if score[0] > best.0 {
            best = (score[0], (x, y));
        }
    }
    best
}

/// Highest-scoring positions, at least `spacing` apart on both axes.
fn peaks(scores: &ScoreMap, count: usize, spacing: u32) -> Vec<(u32, u32)> {
    let mut ranked: Vec<(f32, u32, u32)> = scores
        .enumerate_pixels()
        .map(|(x, y, score)| (score[0], x, y))
        .collect();
    ranked.sort_unstable_by(|a, b| b.0.total_cmp(&a.0));

    let mut picked: Vec<(u32, u32)> = Vec::with_capacity(count);
    for (_, x, y) in ranked {
        if picked.len() == count {
            break;
        }
        let clear = picked
            .iter()
            .all(|&(px, py)| px.abs_diff(x) >= spacing || py.abs_diff(y) >= spacing);
        if clear {
            picked.push((x, y));
        }
    }
    picked
}

fn full_search(screen: &GrayImage, pattern: &GrayImage) -> Located {
    match zncc_scores(screen, pattern) {
        Some(scores) => {
            let (score, top_left) = best_of(&scores);
            Located {
                confidence: score.clamp(0.0, 1.0),
                top_left,
            }
        }
        None => Located {
            confidence: 0.0,
            top_left: (0, 0),
        },
    }
}

fn coarse_to_fine(screen: &GrayImage, pattern: &GrayImage, scale: u32) -> Located {
    let (sw, sh) = screen.dimensions();
    let (pw, ph) = pattern.dimensions();

    let small_screen = imageops::thumbnail(screen, sw / scale, sh / scale);
    let small_pattern = imageops::thumbnail(pattern, pw / scale, ph / scale);
    let Some(coarse) = zncc_scores(&small_screen, &small_pattern) else {
        // Texture finer than the coarse grid.
        return full_search(screen, pattern);
    };

    let spacing = (pw.min(ph) / scale / 2).max(1);
    let margin = scale + 2;
    let mut best = Located {
        confidence: 0.0,
        top_left: (0, 0),
    };
    let mut best_score = f32::NEG_INFINITY;
    for (cx, cy) in peaks(&coarse, REFINE_CANDIDATES, spacing) {
        let x0 = (cx * scale).saturating_sub(margin);
        let y0 = (cy * scale).saturating_sub(margin);
        let x1 = (cx * scale + margin + pw).min(sw);
        let y1 = (cy * scale + margin + ph).min(sh);
        let window = imageops::crop_imm(screen, x0, y0, x1 - x0, y1 - y0).to_image();

        let Some(scores) = zncc_scores(&window, pattern) else {
            continue;
        };
        let (score, (x, y)) = best_of(&scores);
        if score > best_score {
            best_score = score;
            best.top_left = (x0 + x, y0 + y);
        }
    }

    best.confidence = best_score.clamp(0.0, 1.0);
    best
}

impl MatchEngine for NccMatchEngine {
    fn locate(&self, screen: &GrayImage, pattern: &Pattern) -> Option<Located> {
        let (sw, sh) = screen.dimensions();
        let (pw, ph) = (pattern.width(), pattern.height());
        if pw == 0 || ph == 0 || pw > sw || ph > sh {
            return None;
        }

        let scale = (pw.min(ph) / MIN_COARSE_SIDE).clamp(1, MAX_SCALE);
        if scale == 1 {
            Some(full_search(screen, pattern.image()))
        } else {
            Some(coarse_to_fine(screen, pattern.image(), scale))
        }
    }
}
