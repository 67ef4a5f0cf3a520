//! Embeddable markup rendering for normalized charts.

use anyhow::Result;
use serde_json::json;

use crate::chart::Figure;

/// The plotting runtime is referenced over a CDN rather than bundled, to
/// keep the embeddable payload small.
pub const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

const CHART_DIV_ID: &str = "plotgpt-chart";
const EXPORT_FILENAME: &str = "plotgpt-chart";

#[derive(Debug, Clone)]
pub struct RenderedDocument {
    /// Markup fragment with no `<html>`/`<body>` wrapper.
    pub markup: String,
    /// Interaction toggles and toolbar trims handed to the runtime.
    pub ui_config: serde_json::Value,
}

/// Serialize a normalized chart into an embeddable document. Pure and
/// side-effect free; must only ever be called with a validated figure.
pub fn render(fig: &Figure) -> Result<RenderedDocument> {
    let data = serde_json::to_string(&fig.traces)?;
    let layout = serde_json::to_string(&fig.layout)?;
    let ui_config = ui_config();
    let config = serde_json::to_string(&ui_config)?;

    let markup = format!(
        r#"<div id="{CHART_DIV_ID}" class="plotly-graph-div" style="width:100%;height:100%;"></div>
<script src="{PLOTLY_CDN}" charset="utf-8"></script>
<script type="text/javascript">
Plotly.newPlot("{CHART_DIV_ID}", {data}, {layout}, {config});
</script>
"#
    );

    Ok(RenderedDocument { markup, ui_config })
}

fn ui_config() -> serde_json::Value {
    json!({
        "responsive": true,
        "displaylogo": false,
        "scrollZoom": true,
        "toImageButtonOptions": {
            "format": "png",
            "filename": EXPORT_FILENAME
        },
        "modeBarButtonsToRemove": ["lasso2d", "select2d", "toggleSpikelines"]
    })
}
