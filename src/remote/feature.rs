use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Raw record returned by a layer query: attributes plus an optional ESRI geometry payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteFeature {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub attributes: Map<String, Value>,

    #[serde(default)]
    pub geometry: Option<Value>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Map<String, Value>, D::Error> {
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl RemoteFeature {
    pub fn new(attributes: Map<String, Value>, geometry: Option<Value>) -> Self {
        Self { attributes, geometry }
    }
}

/// Body of a page query.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct FeaturePage {
    #[serde(default)]
    pub features: Vec<RemoteFeature>,

    #[serde(default, rename = "exceededTransferLimit")]
    pub exceeded_transfer_limit: bool,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn tolerates_missing_and_null_members() {
        let page: FeaturePage = serde_json::from_value(json!({
            "features": [
                {"attributes": {"ID": 1}, "geometry": {"x": 1.0, "y": 2.0}},
                {"attributes": null},
                {"geometry": null},
            ]
        })).unwrap();

        assert_eq!(page.features.len(), 3);
        assert_eq!(page.features[0].attributes["ID"], json!(1));
        assert!(page.features[1].attributes.is_empty());
        assert!(page.features[1].geometry.is_none());
        assert!(page.features[2].geometry.is_none());
        assert!(!page.exceeded_transfer_limit);
    }

    #[test]
    fn missing_features_is_an_empty_page() {
        let page: FeaturePage = serde_json::from_value(json!({})).unwrap();
        assert!(page.features.is_empty());
    }
}
