use std::io::Cursor;
use std::ops::Range;

use base64::Engine;
use lazy_static::lazy_static;
use plotters::prelude::*;
use plotters::style::register_font;

use crate::discretize::{self, DiscretizeLimits, StepResolution};
use crate::error::{Error, Result};
use crate::piecewise::{linspace, Piecewise};

/// Longest series handed to the backend, longer ones are decimated
const MAX_SERIES_POINTS: usize = 20_000;

const PALETTE: [RGBColor; 6] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
];

const IDEAL_COLOR: RGBColor = RGBColor(190, 190, 190);

const FONT_FAMILY: &str = "sans-serif";
const FONT_BYTES: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

lazy_static! {
    static ref FONT_REGISTERED: std::result::Result<(), String> =
        register_font(FONT_FAMILY, FontStyle::Normal, FONT_BYTES)
            .map_err(|_| "embedded font is not a valid TrueType font".to_owned());
}

/// Text is drawn with the embedded font, register it once per process
fn ensure_font() -> Result<()> {
    FONT_REGISTERED.clone().map_err(Error::Render)
}

/// One line of a chart and its legend entry
struct Series {
    points: Vec<(f64, f64)>,
    color: RGBColor,
    label: String,
}

#[derive(Debug, Clone, Copy)]
pub struct PlotOptions {
    pub width: u32,
    pub height: u32,
    /// Points over the whole span
    pub samples: usize,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 500,
            samples: 1000,
        }
    }
}

fn render_error(e: impl std::fmt::Display) -> Error {
    Error::Render(e.to_string())
}

fn y_range<'a>(series: impl Iterator<Item = &'a Vec<(f64, f64)>>) -> Range<f64> {
    let (min, max) = series
        .flat_map(|s| s.iter().map(|(_, y)| *y))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| {
            (lo.min(y), hi.max(y))
        });

    if !min.is_finite() || !max.is_finite() {
        -1.0..1.0
    } else if max - min < 1e-9 {
        (min - 1.0)..(max + 1.0)
    } else {
        let margin = (max - min) * 0.05;
        (min - margin)..(max + margin)
    }
}

/// Draw `series` with a legend into a PNG
fn draw_png(
    options: PlotOptions,
    x_range: Range<f64>,
    series: &[Series],
    x_desc: &str,
    y_desc: &str,
) -> Result<Vec<u8>> {
    ensure_font()?;

    let (width, height) = (options.width.max(64), options.height.max(64));
    let y_range = y_range(series.iter().map(|s| &s.points));

    let mut buf = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(50)
            .build_cartesian_2d(x_range, y_range)
            .map_err(render_error)?;

        chart
            .configure_mesh()
            .x_desc(x_desc)
            .y_desc(y_desc)
            .draw()
            .map_err(render_error)?;

        for s in series {
            let color = s.color;
            chart
                .draw_series(LineSeries::new(s.points.iter().copied(), color))
                .map_err(render_error)?
                .label(s.label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(render_error)?;

        root.present().map_err(render_error)?;
    }

    let image = image::RgbImage::from_raw(width, height, buf)
        .ok_or_else(|| Error::Render("bitmap size mismatch".to_owned()))?;
    let mut png = Cursor::new(Vec::new());
    image
        .write_to(&mut png, image::ImageFormat::Png)
        .map_err(render_error)?;
    Ok(png.into_inner())
}

/// Every piece in its own colour over the span of all pieces
pub fn render_functions(piecewise: &Piecewise, options: PlotOptions) -> Result<Vec<u8>> {
    let span = piecewise.span();
    let xs = linspace(span.start, span.end, options.samples.max(2)).collect::<Vec<_>>();

    let series = piecewise
        .pieces()
        .iter()
        .enumerate()
        .map(|(i, piece)| {
            let mut ts = xs
                .iter()
                .copied()
                .filter(|t| piece.domain.contains(*t))
                .collect::<Vec<_>>();
            if ts.len() < 2 {
                ts = piece.domain.linspace(2).collect();
            }
            let points = ts
                .into_iter()
                .map(|t| (t, piece.eval(t)))
                .filter(|(_, y)| y.is_finite())
                .collect::<Vec<_>>();
            Series {
                points,
                color: PALETTE[i % PALETTE.len()],
                label: legend_label(&piece.source),
            }
        })
        .collect::<Vec<_>>();

    draw_png(options, span.start..span.end, &series, "x", "y")
}

/// Legend entry of a piece, long expressions are shortened
fn legend_label(source: &str) -> String {
    const MAX_CHARS: usize = 40;
    let source = source.trim();
    if source.chars().count() > MAX_CHARS {
        let head = source.chars().take(MAX_CHARS - 3).collect::<String>();
        format!("y = {head}...")
    } else {
        format!("y = {source}")
    }
}

/// Convert `(t, angle)` samples into a staircase: each value is held until
/// the next sample
fn staircase(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut out = Vec::with_capacity(points.len() * 2);
    for pair in points.windows(2) {
        let ((t0, a0), (t1, _)) = (pair[0], pair[1]);
        out.push((t0, a0));
        out.push((t1, a0));
    }
    if let Some(last) = points.last() {
        out.push(*last);
    }
    out
}

/// What the motor really executes at `resolution`: the microstep-rounded
/// discretization drawn as steps, over the ideal curve
pub fn render_profile(
    piecewise: &Piecewise,
    resolution: StepResolution,
    limits: DiscretizeLimits,
    options: PlotOptions,
) -> Result<Vec<u8>> {
    let span = piecewise.span();
    let points = discretize::profile_points(piecewise, resolution, limits)?;
    let steps = discretize::decimate(&staircase(&points), MAX_SERIES_POINTS);

    let ideal = linspace(span.start, span.end, options.samples.max(2))
        .map(|t| (t, piecewise.eval(t)))
        .filter(|(_, y)| y.is_finite())
        .collect::<Vec<_>>();

    draw_png(
        options,
        span.start..span.end,
        &[
            Series {
                points: ideal,
                color: IDEAL_COLOR,
                label: "ideal".to_owned(),
            },
            Series {
                points: steps,
                color: PALETTE[0],
                label: format!(
                    "{} deg / {} microsteps",
                    resolution.step_angle, resolution.microsteps
                ),
            },
        ],
        "time [s]",
        "angle [deg]",
    )
}

/// Form used in `{"img": ...}` responses
pub fn to_base64(png: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(png)
}

pub fn from_base64(img: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(img)
        .map_err(|e| Error::Render(format!("bad image data: {e}")))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::FunctionRow;
    use crate::piecewise::NO_VALID_PAIRS;

    const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn piecewise(r: &[(&str, &str)]) -> Piecewise {
        let rows = r
            .iter()
            .map(|(f, d)| FunctionRow::new(*f, *d))
            .collect::<Vec<_>>();
        Piecewise::from_rows(&rows, NO_VALID_PAIRS).unwrap()
    }

    #[test]
    fn test_functions_png() {
        let pw = piecewise(&[("sin(x)", "0,3.14"), ("0", "3.14,6")]);
        let png = render_functions(
            &pw,
            PlotOptions {
                width: 320,
                height: 200,
                samples: 200,
            },
        )
        .unwrap();
        assert!(png.starts_with(PNG_SIGNATURE));

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), 320);
        assert_eq!(decoded.height(), 200);
    }

    #[test]
    fn test_profile_png() {
        let pw = piecewise(&[("10*x", "0,1")]);
        let png = render_profile(
            &pw,
            StepResolution {
                step_angle: 1.8,
                microsteps: 1,
            },
            DiscretizeLimits::default(),
            PlotOptions::default(),
        )
        .unwrap();
        assert!(png.starts_with(PNG_SIGNATURE));
        assert_eq!(from_base64(&to_base64(&png)).unwrap(), png);
    }

    #[test]
    fn test_staircase() {
        let s = staircase(&[(0.0, 1.0), (1.0, 2.0), (2.0, 3.0)]);
        assert_eq!(
            s,
            vec![
                (0.0, 1.0),
                (1.0, 1.0),
                (1.0, 2.0),
                (2.0, 2.0),
                (2.0, 3.0)
            ]
        );
        assert!(staircase(&[]).is_empty());
    }

    #[test]
    fn test_legend_label() {
        assert_eq!(legend_label(" 10*sin(x) "), "y = 10*sin(x)");
        let long = "x+".repeat(40) + "x";
        let label = legend_label(&long);
        assert!(label.starts_with("y = x+x+"));
        assert!(label.ends_with("..."));
        assert_eq!(label.chars().count(), 4 + 40);
    }

    #[test]
    fn test_text_is_drawn() {
        // Axis labels and the legend leave dark pixels in the margins
        let pw = piecewise(&[("x", "0,1")]);
        let png = render_functions(&pw, PlotOptions::default()).unwrap();
        let img = image::load_from_memory(&png).unwrap().to_rgb8();
        let dark_in_left_margin = (0..img.height())
            .flat_map(|y| (0..40).map(move |x| (x, y)))
            .filter(|(x, y)| img.get_pixel(*x, *y).0.iter().all(|c| *c < 128))
            .count();
        assert!(dark_in_left_margin > 0);
    }

    #[test]
    fn test_flat_range_is_padded() {
        let s = vec![(0.0, 5.0), (1.0, 5.0)];
        assert_eq!(y_range([&s].into_iter()), 4.0..6.0);
        assert_eq!(y_range(std::iter::empty()), -1.0..1.0);
    }
}
