use crate::model::{FeatureProperties, LayerId, PopupField, PopupState, RenderPoint};
use crate::view::surface::MapSurface;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub enum PickOutcome {
    /// The click was not for the picker; popup state is untouched.
    Ignored,
    /// Nothing under the pointer; any open popup closes.
    Cleared,
    Opened(PopupState),
}

/// Resolves a click into popup content.
///
/// Drawing takes priority over picking, and only the tiled overlay is
/// pickable, so clicks are ignored while a draw interaction is active or
/// when no tiled overlay is mounted.
pub fn pick(
    surface: &dyn MapSurface,
    draw_active: bool,
    tiled_overlay: Option<LayerId>,
    at: RenderPoint,
    tolerance: f64,
) -> PickOutcome {
    if draw_active {
        return PickOutcome::Ignored;
    }
    let Some(layer) = tiled_overlay else {
        return PickOutcome::Ignored;
    };
    match surface.features_at(layer, at, tolerance).first() {
        Some(properties) => PickOutcome::Opened(PopupState {
            anchor: at,
            fields: popup_fields(properties),
        }),
        None => PickOutcome::Cleared,
    }
}

pub fn popup_fields(properties: &FeatureProperties) -> Vec<PopupField> {
    let mut fields = vec![
        PopupField {
            label: "Name",
            value: text(properties, "name").unwrap_or_else(|| "Unnamed".to_string()),
        },
        PopupField {
            label: "Landuse",
            value: text(properties, "landuse_type").unwrap_or_else(|| "Unknown".to_string()),
        },
        PopupField {
            label: "Leisure",
            value: text(properties, "leisure").unwrap_or_else(|| "-".to_string()),
        },
        PopupField {
            label: "City",
            value: text(properties, "city").unwrap_or_else(|| "-".to_string()),
        },
        PopupField {
            label: "OSM ID",
            value: text(properties, "osm_id").unwrap_or_else(|| "-".to_string()),
        },
    ];
    if let Some(area) = area(properties) {
        fields.push(PopupField {
            label: "Area",
            value: format!("{:.2} m²", area),
        });
    }
    fields
}

fn text(properties: &FeatureProperties, key: &str) -> Option<String> {
    match properties.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// The backend stores area either as a number or as a numeric string
fn area(properties: &FeatureProperties) -> Option<f64> {
    let value = match properties.get("area")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn properties(value: Value) -> FeatureProperties {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn fields_fall_back_when_missing() {
        let fields = popup_fields(&FeatureProperties::new());
        let values: Vec<_> = fields.iter().map(|f| f.value.as_str()).collect();
        assert_eq!(values, vec!["Unnamed", "Unknown", "-", "-", "-"]);
    }

    #[test]
    fn area_is_formatted_with_two_decimals() {
        let fields = popup_fields(&properties(json!({
            "name": "Tiergarten",
            "landuse_type": "forest",
            "osm_id": 12345,
            "area": "2100000.456",
        })));
        let popup = PopupState {
            anchor: RenderPoint::new(0.0, 0.0),
            fields,
        };
        assert_eq!(popup.field("Name"), Some("Tiergarten"));
        assert_eq!(popup.field("OSM ID"), Some("12345"));
        assert_eq!(popup.field("Area"), Some("2100000.46 m²"));
    }

    #[test]
    fn non_numeric_area_is_omitted() {
        let fields = popup_fields(&properties(json!({ "area": "n/a" })));
        assert!(fields.iter().all(|field| field.label != "Area"));
        let fields = popup_fields(&properties(json!({ "area": 12.5 })));
        assert_eq!(fields.last().map(|f| f.value.as_str()), Some("12.50 m²"));
    }

    #[test]
    fn blank_name_counts_as_missing() {
        let fields = popup_fields(&properties(json!({ "name": "  " })));
        assert_eq!(fields[0].value, "Unnamed");
    }
}
