use crate::model::{FeatureProperties, LayerStyle, Style};

// Fill colour per landuse category. Unknown or missing categories fall back
// to a neutral grey.
pub fn landuse_fill(landuse_type: Option<&str>) -> &'static str {
    match landuse_type.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("residential") => "rgba(255,0,0,0.4)",
        Some("farmland") => "rgba(255,255,0,0.4)",
        Some("forest") => "rgba(0,128,0,0.4)",
        Some("allotments") => "rgba(0,0,255,0.4)",
        Some("flowerbed") => "rgba(255,0,255,0.4)",
        Some("greenhouse-horticulture") | Some("greenhouse_horticulture") => "rgba(0,255,255,0.4)",
        Some("orchard") => "rgba(128,64,0,0.4)",
        Some("commercial") => "rgba(255,165,0,0.4)",
        Some("industrial") => "rgba(128,128,128,0.4)",
        _ => "rgba(200,200,200,0.4)",
    }
}

pub fn landuse_style(properties: &FeatureProperties) -> Style {
    let landuse_type = properties.get("landuse_type").and_then(|v| v.as_str());
    Style {
        fill: Some(landuse_fill(landuse_type).to_string()),
        stroke: "#333".to_string(),
        stroke_width: 1.0,
    }
}

pub fn data_overlay_style() -> LayerStyle {
    LayerStyle::Fixed(Style {
        fill: Some("rgba(51,153,204,0.25)".to_string()),
        stroke: "#3399CC".to_string(),
        stroke_width: 1.25,
    })
}

pub fn draw_scratch_style() -> LayerStyle {
    LayerStyle::Fixed(Style {
        fill: Some("rgba(200,0,0,0.1)".to_string()),
        stroke: "#d33".to_string(),
        stroke_width: 2.0,
    })
}

// Rectangle shown while a drag is in progress
pub fn draw_sketch_style() -> Style {
    Style {
        fill: Some("rgba(0,0,255,0.1)".to_string()),
        stroke: "#00f".to_string(),
        stroke_width: 2.0,
    }
}
