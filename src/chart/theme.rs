//! House style applied to every validated chart, whatever the engine asked
//! for. Two passes: legend completion, then theme constants. Both are
//! idempotent and neither touches trace geometry.

use crate::chart::{Axis3d, Figure, Font, Legend, Margin};

pub const PAPER_BG: &str = "#0f172a";
pub const PLOT_BG: &str = "#0f172a";
pub const AXIS_BG: &str = "#1e293b";
pub const GRID_COLOR: &str = "#475569";
pub const ZEROLINE_COLOR: &str = "#64748b";
pub const FONT_FAMILY: &str = "Inter, \"Segoe UI\", sans-serif";
pub const FONT_SIZE: f64 = 13.0;
pub const FONT_COLOR: &str = "#e2e8f0";
pub const LEGEND_BG: &str = "rgba(226, 232, 240, 0.85)";
pub const LEGEND_FONT_COLOR: &str = "#0f172a";
pub const COLORWAY: [&str; 8] = [
    "#60a5fa", "#f472b6", "#34d399", "#fbbf24", "#a78bfa", "#f87171", "#22d3ee", "#fb923c",
];

/// Rewrite presentation to the house style. Pure: same input figure, same
/// output figure, and `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(mut fig: Figure) -> Figure {
    complete_legend(&mut fig);
    apply_theme(&mut fig);
    fig
}

/// Every trace gets a non-empty display name and a visible legend entry.
fn complete_legend(fig: &mut Figure) {
    for (index, trace) in fig.traces.iter_mut().enumerate() {
        let unnamed = trace.name.as_deref().map(str::is_empty).unwrap_or(true);
        if unnamed {
            trace.name = Some(format!("Trace {}", index + 1));
        }
        trace.show_legend = Some(true);
    }
}

/// Overwrite layout-level presentation with fixed constants. Engine-chosen
/// titles and aspect mode survive; colors, fonts, legend, margins, and
/// hover behavior do not.
fn apply_theme(fig: &mut Figure) {
    let layout = &mut fig.layout;

    layout.paper_bgcolor = Some(PAPER_BG.to_string());
    layout.plot_bgcolor = Some(PLOT_BG.to_string());
    layout.font = Some(Font {
        family: Some(FONT_FAMILY.to_string()),
        size: Some(FONT_SIZE),
        color: Some(FONT_COLOR.to_string()),
        weight: None,
    });
    layout.colorway = Some(COLORWAY.iter().map(|c| c.to_string()).collect());
    layout.legend = Some(Legend {
        bgcolor: LEGEND_BG.to_string(),
        font: Font {
            family: Some(FONT_FAMILY.to_string()),
            size: Some(FONT_SIZE),
            color: Some(LEGEND_FONT_COLOR.to_string()),
            weight: Some(700),
        },
    });
    layout.margin = Some(Margin {
        l: 40.0,
        r: 20.0,
        t: 48.0,
        b: 40.0,
    });
    layout.hovermode = Some("closest".to_string());

    let mut scene = layout.scene.take().unwrap_or_default();
    for axis in [&mut scene.xaxis, &mut scene.yaxis, &mut scene.zaxis] {
        let themed = themed_axis(axis.take());
        *axis = Some(themed);
    }
    layout.scene = Some(scene);
}

fn themed_axis(axis: Option<Axis3d>) -> Axis3d {
    let title = axis.and_then(|a| a.title);
    Axis3d {
        title,
        gridcolor: Some(GRID_COLOR.to_string()),
        zerolinecolor: Some(ZEROLINE_COLOR.to_string()),
        showbackground: Some(true),
        backgroundcolor: Some(AXIS_BG.to_string()),
        tickfont: Some(Font {
            family: None,
            size: Some(FONT_SIZE - 1.0),
            color: Some(FONT_COLOR.to_string()),
            weight: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{Coords, Layout, Scene3d, Title, Trace, TraceKind};

    fn surface(name: Option<&str>) -> Trace {
        let grid = vec![vec![0.0, 1.0], vec![2.0, 3.0]];
        let mut t = Trace::new(
            TraceKind::Surface,
            Coords::Grid(grid.clone()),
            Coords::Grid(grid.clone()),
            Coords::Grid(grid),
        );
        t.name = name.map(str::to_string);
        t
    }

    fn figure(traces: Vec<Trace>) -> Figure {
        Figure {
            traces,
            layout: Layout::default(),
        }
    }

    #[test]
    fn unnamed_traces_get_deterministic_names() {
        let fig = normalize(figure(vec![surface(None), surface(Some("")), surface(Some("halo"))]));
        let names: Vec<_> = fig
            .traces
            .iter()
            .map(|t| t.name.as_deref().unwrap_or(""))
            .collect();
        assert_eq!(names, vec!["Trace 1", "Trace 2", "halo"]);
    }

    #[test]
    fn legend_visibility_is_forced_on() {
        let fig = normalize(figure(vec![surface(Some("a")), surface(None)]));
        assert!(fig.traces.iter().all(|t| t.show_legend == Some(true)));
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize(figure(vec![surface(None), surface(Some("x"))]));
        let twice = normalize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn trace_geometry_is_untouched() {
        let before = figure(vec![surface(None)]);
        let expected = before.traces[0].z.clone();
        let after = normalize(before);
        assert_eq!(after.traces[0].z, expected);
        assert_eq!(after.traces[0].x, after.traces[0].y);
    }

    #[test]
    fn theme_overwrites_layout_presentation() {
        let fig = normalize(figure(vec![surface(None)]));
        assert_eq!(fig.layout.paper_bgcolor.as_deref(), Some(PAPER_BG));
        assert_eq!(fig.layout.hovermode.as_deref(), Some("closest"));
        assert_eq!(
            fig.layout.legend.as_ref().map(|l| l.bgcolor.as_str()),
            Some(LEGEND_BG)
        );
        let scene = fig.layout.scene.as_ref().expect("scene");
        let z = scene.zaxis.as_ref().expect("zaxis");
        assert_eq!(z.gridcolor.as_deref(), Some(GRID_COLOR));
        assert_eq!(z.showbackground, Some(true));
    }

    #[test]
    fn engine_titles_survive_theming() {
        let mut fig = figure(vec![surface(None)]);
        fig.layout.title = Some(Title { text: "Sphere".into() });
        fig.layout.scene = Some(Scene3d {
            xaxis: Some(Axis3d {
                title: Some(Title { text: "u".into() }),
                ..Axis3d::default()
            }),
            ..Scene3d::default()
        });
        let themed = normalize(fig);
        assert_eq!(themed.layout.title.as_ref().map(|t| t.text.as_str()), Some("Sphere"));
        let x = themed.layout.scene.as_ref().and_then(|s| s.xaxis.as_ref()).expect("xaxis");
        assert_eq!(x.title.as_ref().map(|t| t.text.as_str()), Some("u"));
    }
}
