//! Single OpenStreetMap raster tiles, located by the centre of a request's
//! bounding box.
use crate::error::Result;
use crate::provider::{save_response, staging_path, Artifact, ImageryProvider};
use crate::request_template::ImageryRequest;
use std::f64::consts::PI;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Web Mercator stops here.
const MAX_LATITUDE: f64 = 85.051_128_78;
const MAX_ZOOM: u8 = 19;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

pub fn tile_for(latitude: f64, longitude: f64, zoom: u8) -> Tile {
    let z = zoom.min(MAX_ZOOM);
    let n = f64::from(1_u32 << z);
    let lat = latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();

    let x = ((longitude + 180.0) / 360.0 * n).floor();
    let y = ((1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * n).floor();

    let max = n - 1.0;
    Tile {
        x: x.clamp(0.0, max) as u32,
        y: y.clamp(0.0, max) as u32,
        z,
    }
}

impl Tile {
    pub fn url(self: &Self, template: &str) -> String {
        template
            .replace("{z}", &self.z.to_string())
            .replace("{x}", &self.x.to_string())
            .replace("{y}", &self.y.to_string())
    }
}

pub struct TileProvider {
    client: reqwest::Client,
    url_template: String,
    zoom: u8,
}

impl TileProvider {
    pub fn new(url_template: &str, zoom: u8) -> Result<Self> {
        // The OSM tile policy requires an identifying User-Agent.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url_template: url_template.to_string(),
            zoom,
        })
    }

    /// The tile containing the requested point, not the bbox centre.
    pub fn tile(self: &Self, request: &ImageryRequest) -> Tile {
        tile_for(request.center.latitude, request.center.longitude, self.zoom)
    }
}

impl ImageryProvider for TileProvider {
    fn name(self: &Self) -> &str {
        "osm"
    }

    async fn submit(self: &Self, request: &ImageryRequest, data_folder: &Path) -> Result<Artifact> {
        let tile = self.tile(request);
        let url = tile.url(&self.url_template);
        debug!(%url, ?tile, "Fetching tile");

        let response = self.client.get(url).send().await?;
        save_response(response, &staging_path(data_folder, request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::CoordinatePair;
    use crate::request_template::RequestTemplate;

    #[test]
    fn test_zoom_zero_is_single_tile() {
        assert_eq!(tile_for(37.7749, -122.4194, 0), Tile { x: 0, y: 0, z: 0 });
    }

    #[test]
    fn test_san_francisco() {
        // https://tile.openstreetmap.org/14/2620/6332.png
        assert_eq!(
            tile_for(37.7749, -122.4194, 14),
            Tile {
                x: 2620,
                y: 6332,
                z: 14
            }
        );
    }

    #[test]
    fn test_quadrants_at_zoom_one() {
        assert_eq!(tile_for(45.0, -90.0, 1), Tile { x: 0, y: 0, z: 1 });
        assert_eq!(tile_for(45.0, 90.0, 1), Tile { x: 1, y: 0, z: 1 });
        assert_eq!(tile_for(-45.0, -90.0, 1), Tile { x: 0, y: 1, z: 1 });
        assert_eq!(tile_for(-45.0, 90.0, 1), Tile { x: 1, y: 1, z: 1 });
    }

    #[test]
    fn test_edges_stay_in_range() {
        let tile = tile_for(90.0, 180.0, 3);
        assert_eq!((tile.x, tile.y), (7, 0));
        let tile = tile_for(-90.0, -180.0, 3);
        assert_eq!((tile.x, tile.y), (0, 7));
        assert_eq!(tile_for(0.0, 0.0, 25).z, MAX_ZOOM);
    }

    #[test]
    fn test_tile_near_antimeridian() {
        let provider = TileProvider::new(DEFAULT_TILE_URL, 14).unwrap();
        let pair = CoordinatePair::new(0.0, 179.99);
        let request = RequestTemplate::default().build(&pair).unwrap();
        assert_eq!(provider.tile(&request), tile_for(0.0, 179.99, 14));
        assert_eq!(provider.tile(&request).x, 16383);
    }

    #[test]
    fn test_url() {
        let tile = Tile { x: 2620, y: 6332, z: 14 };
        assert_eq!(
            tile.url(DEFAULT_TILE_URL),
            "https://tile.openstreetmap.org/14/2620/6332.png"
        );
    }
}
