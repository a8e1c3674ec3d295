use crate::coords::CoordinatePair;
use crate::error::Result;
use crate::geometry::BoundingBox;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const TRUE_COLOR_EVALSCRIPT: &str = r#"//VERSION=3
function setup() {
    return {
        input: ["B02", "B03", "B04"],
        output: [
            {
                id: "default",
                bands: 3,
                sampleType: SampleType.AUTO
            }
        ]
    };
}

function evaluatePixel(samples) {
    return [samples.B04, samples.B03, samples.B02];
}
"#;

/// The fixed part of every request in a batch. Only the bounding box
/// changes from one coordinate pair to the next.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct RequestTemplate {
    pub id: String,
    pub name: String,
    pub data_collection: String,
    pub time_from: String,
    pub time_to: String,
    /// Informational. The evalscript decides which bands are actually read.
    pub bands: Vec<String>,
    pub evalscript: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub mosaicking_order: String,
    /// Distance from the point to each edge of the bounding box.
    pub half_extent_m: f64,
}

impl Default for RequestTemplate {
    /// Sentinel-2 L2A true colour for January 2022, 800x800 PNG.
    fn default() -> Self {
        Self {
            id: "sentinelhub.sentinel2l2a.truecolor".to_string(),
            name: "Sentinel-2 L2A True Color".to_string(),
            data_collection: "sentinel-2-l2a".to_string(),
            time_from: "2022-01-01T00:00:00Z".to_string(),
            time_to: "2022-01-31T23:59:59Z".to_string(),
            bands: vec!["B02".to_string(), "B03".to_string(), "B04".to_string()],
            evalscript: TRUE_COLOR_EVALSCRIPT.to_string(),
            mime_type: "image/png".to_string(),
            width: 800,
            height: 800,
            mosaicking_order: "mostRecent".to_string(),
            // 800 px at 10 m
            half_extent_m: 4000.0,
        }
    }
}

impl RequestTemplate {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let template: Self = toml::from_str(&content)?;
        Ok(template)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// File extension matching `mime_type`.
    pub fn extension(self: &Self) -> &str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/tiff" => "tif",
            "application/json" => "json",
            "application/octet-stream" => "bin",
            other => {
                let subtype = other.split_once('/').map_or("", |(_, sub)| sub);
                // image/svg+xml -> svg, text/csv; charset=utf-8 -> csv
                let subtype = match subtype.find(['+', ';']) {
                    Some(end) => &subtype[..end],
                    None => subtype,
                };
                let subtype = subtype.trim();
                if subtype.is_empty() {
                    "bin"
                } else {
                    subtype
                }
            }
        }
    }

    /// Request for the window around `pair`. Fails for coordinates outside
    /// the valid WGS84 range.
    pub fn build(self: &Self, pair: &CoordinatePair) -> Result<ImageryRequest> {
        let bbox = BoundingBox::around(pair, self.half_extent_m)?;
        Ok(ImageryRequest {
            center: *pair,
            bbox,
            data_collection: self.data_collection.clone(),
            time_range: (self.time_from.clone(), self.time_to.clone()),
            bands: self.bands.clone(),
            evalscript: self.evalscript.clone(),
            mime_type: self.mime_type.clone(),
            extension: self.extension().to_string(),
            width: self.width,
            height: self.height,
            mosaicking_order: self.mosaicking_order.clone(),
        })
    }
}

/// One bounded-area request, ready to hand to a provider.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ImageryRequest {
    /// The requested point. `bbox` may be clamped at the poles and the
    /// antimeridian, so its centre can drift away from it.
    pub center: CoordinatePair,
    pub bbox: BoundingBox,
    pub data_collection: String,
    pub time_range: (String, String),
    pub bands: Vec<String>,
    pub evalscript: String,
    pub mime_type: String,
    pub extension: String,
    pub width: u32,
    pub height: u32,
    pub mosaicking_order: String,
}

impl ImageryRequest {
    /// Body for `POST /api/v1/process`.
    pub fn process_body(self: &Self) -> serde_json::Value {
        serde_json::json!({
            "input": {
                "bounds": {
                    "bbox": self.bbox.as_array(),
                    "properties": { "crs": self.bbox.crs.uri() }
                },
                "data": [{
                    "type": self.data_collection,
                    "dataFilter": {
                        "timeRange": {
                            "from": self.time_range.0,
                            "to": self.time_range.1
                        },
                        "mosaickingOrder": self.mosaicking_order
                    }
                }]
            },
            "output": {
                "width": self.width,
                "height": self.height,
                "responses": [{
                    "identifier": "default",
                    "format": { "type": self.mime_type }
                }]
            },
            "evalscript": self.evalscript
        })
    }
}
