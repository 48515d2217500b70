use crate::record::IpDetails;

/// Self-contained OpenLayers page with an OSM tile layer and a single
/// marker on the record's coordinates. Rendered by substitution only, no
/// GUI dependency: the caller hands the string to whatever displays HTML.
pub fn map_page(details: &IpDetails) -> String {
    match details.coordinates() {
        Some((lat, lon)) => marker_page(lat, lon),
        None => placeholder_page("Map will be displayed here."),
    }
}

fn marker_page(lat: f64, lon: f64) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8" />
  <style>
    html, body, #map {{ margin: 0; padding: 0; width: 100%; height: 100%; }}
  </style>
  <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/ol@v7.4.0/ol.css">
  <script src="https://cdn.jsdelivr.net/npm/ol@v7.4.0/dist/ol.js"></script>
</head>
<body>
  <div id="map"></div>
  <script>
    var map = new ol.Map({{
      target: 'map',
      layers: [new ol.layer.Tile({{ source: new ol.source.OSM() }})],
      view: new ol.View({{
        center: ol.proj.fromLonLat([{lon}, {lat}]),
        zoom: 11
      }})
    }});
    var marker = new ol.Feature({{
      geometry: new ol.geom.Point(ol.proj.fromLonLat([{lon}, {lat}]))
    }});
    map.addLayer(new ol.layer.Vector({{
      source: new ol.source.Vector({{ features: [marker] }})
    }}));
  </script>
</body>
</html>
"#
    )
}

pub fn placeholder_page(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="text-align: center; padding-top: 20px;">{message}</body>
</html>
"#
    )
}
