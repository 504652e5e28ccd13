use std::collections::BTreeMap;

use kurbo::{Affine, BezPath, Point, Rect, Shape};

use crate::error::{ChartError, ChartResult};

/// Primary remote source for the US state boundary topology.
pub const PRIMARY_STATES_URL: &str = "https://cdn.jsdelivr.net/npm/us-atlas@3/states-10m.json";
/// Single documented fallback, tried once when the primary fails.
pub const FALLBACK_STATES_URL: &str =
    "https://raw.githubusercontent.com/topojson/us-atlas/master/states-10m.json";

/// Drawable boundary for one state: outline path in topology coordinates
/// plus its area-weighted centroid for label placement.
#[derive(Clone, Debug)]
pub struct StateShape {
    pub name: String,
    pub abbrev: String,
    pub path: BezPath,
    pub centroid: Point,
}

/// All decoded state boundaries, ready to be fitted into a viewport.
#[derive(Clone, Debug, Default)]
pub struct StateShapes {
    states: Vec<StateShape>,
}

impl StateShapes {
    pub fn iter(&self) -> impl Iterator<Item = &StateShape> {
        self.states.iter()
    }

    pub fn get(&self, name: &str) -> Option<&StateShape> {
        self.states.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Union bounding box of every boundary path.
    pub fn bounds(&self) -> Rect {
        let mut iter = self.states.iter();
        let Some(first) = iter.next() else {
            return Rect::ZERO;
        };
        iter.fold(first.path.bounding_box(), |acc, s| {
            acc.union(s.path.bounding_box())
        })
    }

    /// Uniformly scale and center every shape into a `width` x `height`
    /// viewport with `padding` pixels kept clear on each side.
    pub fn fit(&self, width: f64, height: f64, padding: f64) -> StateShapes {
        let b = self.bounds();
        if b.width() == 0.0 || b.height() == 0.0 {
            return self.clone();
        }
        let inner_w = (width - 2.0 * padding).max(1.0);
        let inner_h = (height - 2.0 * padding).max(1.0);
        let scale = (inner_w / b.width()).min(inner_h / b.height());
        let tx = (width - b.width() * scale) / 2.0 - b.x0 * scale;
        let ty = (height - b.height() * scale) / 2.0 - b.y0 * scale;
        let affine = Affine::translate((tx, ty)) * Affine::scale(scale);

        let states = self
            .states
            .iter()
            .map(|s| {
                let mut path = s.path.clone();
                path.apply_affine(affine);
                StateShape {
                    name: s.name.clone(),
                    abbrev: s.abbrev.clone(),
                    path,
                    centroid: affine * s.centroid,
                }
            })
            .collect();
        StateShapes { states }
    }
}

// ---- TopoJSON wire model ------------------------------------------------

#[derive(Debug, serde::Deserialize)]
struct Topology {
    #[serde(default)]
    transform: Option<TopoTransform>,
    arcs: Vec<Vec<[f64; 2]>>,
    objects: BTreeMap<String, GeometryCollection>,
}

#[derive(Debug, serde::Deserialize)]
struct TopoTransform {
    scale: [f64; 2],
    translate: [f64; 2],
}

#[derive(Debug, serde::Deserialize)]
struct GeometryCollection {
    #[serde(default)]
    geometries: Vec<Geometry>,
}

#[derive(Debug, serde::Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    arcs: serde_json::Value,
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Default, serde::Deserialize)]
struct Properties {
    #[serde(default)]
    name: String,
}

/// Parse a TopoJSON document and decode the named object's polygons into
/// boundary paths. Only `Polygon` and `MultiPolygon` geometries are kept.
#[tracing::instrument(skip(json))]
pub fn parse_topology(json: &str, object: &str) -> ChartResult<StateShapes> {
    let topo: Topology = serde_json::from_str(json)
        .map_err(|e| ChartError::geo(format!("malformed topology: {e}")))?;
    let collection = topo
        .objects
        .get(object)
        .ok_or_else(|| ChartError::geo(format!("topology has no object '{object}'")))?;

    let arcs = decode_arcs(&topo);
    let mut states = Vec::new();
    for geometry in &collection.geometries {
        let rings: Vec<Vec<i64>> = match geometry.kind.as_str() {
            "Polygon" => serde_json::from_value(geometry.arcs.clone())
                .map_err(|e| ChartError::geo(format!("bad Polygon arcs: {e}")))?,
            "MultiPolygon" => {
                let polys: Vec<Vec<Vec<i64>>> = serde_json::from_value(geometry.arcs.clone())
                    .map_err(|e| ChartError::geo(format!("bad MultiPolygon arcs: {e}")))?;
                polys.into_iter().flatten().collect()
            }
            other => {
                tracing::warn!(kind = other, "skipping non-polygon geometry");
                continue;
            }
        };

        let rings: Vec<Vec<Point>> = rings
            .iter()
            .map(|ring| join_ring(&arcs, ring))
            .collect::<ChartResult<_>>()?;

        let mut path = BezPath::new();
        for ring in &rings {
            let Some((first, rest)) = ring.split_first() else {
                continue;
            };
            path.move_to(*first);
            for p in rest {
                path.line_to(*p);
            }
            path.close_path();
        }

        let name = geometry.properties.name.clone();
        states.push(StateShape {
            abbrev: abbreviate(&name),
            centroid: rings_centroid(&rings),
            name,
            path,
        });
    }

    tracing::debug!(shapes = states.len(), "topology decoded");
    Ok(StateShapes { states })
}

/// Decode every arc to absolute coordinates. Quantized topologies
/// delta-encode positions after the first; the transform maps them back to
/// source coordinates.
fn decode_arcs(topo: &Topology) -> Vec<Vec<Point>> {
    topo.arcs
        .iter()
        .map(|arc| match &topo.transform {
            Some(t) => {
                let mut x = 0.0;
                let mut y = 0.0;
                arc.iter()
                    .map(|[dx, dy]| {
                        x += dx;
                        y += dy;
                        Point::new(
                            x * t.scale[0] + t.translate[0],
                            y * t.scale[1] + t.translate[1],
                        )
                    })
                    .collect()
            }
            None => arc.iter().map(|[x, y]| Point::new(*x, *y)).collect(),
        })
        .collect()
}

/// Stitch arc references into one ring. Index `~i` (encoded as `-1 - i`)
/// means arc `i` reversed; consecutive arcs share their junction point, so
/// every arc after the first drops its lead point.
fn join_ring(arcs: &[Vec<Point>], refs: &[i64]) -> ChartResult<Vec<Point>> {
    let mut ring: Vec<Point> = Vec::new();
    for (i, &r) in refs.iter().enumerate() {
        let (index, reversed) = if r < 0 {
            ((-1 - r) as usize, true)
        } else {
            (r as usize, false)
        };
        let arc = arcs
            .get(index)
            .ok_or_else(|| ChartError::geo(format!("arc index {r} out of range")))?;
        let mut points: Vec<Point> = if reversed {
            arc.iter().rev().copied().collect()
        } else {
            arc.clone()
        };
        if i > 0 && !points.is_empty() {
            points.remove(0);
        }
        ring.extend(points);
    }
    Ok(ring)
}

/// Area-weighted centroid over all rings (shoelace). Degenerate rings fall
/// back to the mean of their points.
fn rings_centroid(rings: &[Vec<Point>]) -> Point {
    let mut area = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    let mut sum = Point::ZERO;
    let mut count = 0usize;

    for ring in rings {
        for w in ring.windows(2) {
            let cross = w[0].x * w[1].y - w[1].x * w[0].y;
            area += cross;
            cx += (w[0].x + w[1].x) * cross;
            cy += (w[0].y + w[1].y) * cross;
        }
        if let (Some(first), Some(last)) = (ring.first(), ring.last()) {
            let cross = last.x * first.y - first.x * last.y;
            area += cross;
            cx += (last.x + first.x) * cross;
            cy += (last.y + first.y) * cross;
        }
        for p in ring {
            sum += p.to_vec2();
            count += 1;
        }
    }

    if area.abs() < 1e-12 {
        if count == 0 {
            return Point::ZERO;
        }
        return Point::new(sum.x / count as f64, sum.y / count as f64);
    }
    Point::new(cx / (3.0 * area), cy / (3.0 * area))
}

/// Fetch and decode the state topology, trying the fallback source once.
/// Both sources failing is terminal for the map only; other views keep
/// working without geography.
#[tracing::instrument(skip(fetch))]
pub fn load_states<F>(mut fetch: F) -> ChartResult<StateShapes>
where
    F: FnMut(&str) -> anyhow::Result<String>,
{
    match fetch(PRIMARY_STATES_URL) {
        Ok(json) => return parse_topology(&json, "states"),
        Err(e) => {
            tracing::warn!(error = %e, "primary topology source failed, trying fallback");
        }
    }
    match fetch(FALLBACK_STATES_URL) {
        Ok(json) => parse_topology(&json, "states"),
        Err(e) => Err(ChartError::geo(format!(
            "both topology sources failed: {e}"
        ))),
    }
}

/// Two-letter display code for a state name; unknown names take their first
/// two letters uppercased.
pub fn abbreviate(name: &str) -> String {
    for (full, code) in STATE_CODES {
        if *full == name {
            return (*code).to_string();
        }
    }
    name.chars().take(2).collect::<String>().to_uppercase()
}

const STATE_CODES: &[(&str, &str)] = &[
    ("Alabama", "AL"),
    ("Alaska", "AK"),
    ("Arizona", "AZ"),
    ("Arkansas", "AR"),
    ("California", "CA"),
    ("Colorado", "CO"),
    ("Connecticut", "CT"),
    ("Delaware", "DE"),
    ("District of Columbia", "DC"),
    ("Florida", "FL"),
    ("Georgia", "GA"),
    ("Hawaii", "HI"),
    ("Idaho", "ID"),
    ("Illinois", "IL"),
    ("Indiana", "IN"),
    ("Iowa", "IA"),
    ("Kansas", "KS"),
    ("Kentucky", "KY"),
    ("Louisiana", "LA"),
    ("Maine", "ME"),
    ("Maryland", "MD"),
    ("Massachusetts", "MA"),
    ("Michigan", "MI"),
    ("Minnesota", "MN"),
    ("Mississippi", "MS"),
    ("Missouri", "MO"),
    ("Montana", "MT"),
    ("Nebraska", "NE"),
    ("Nevada", "NV"),
    ("New Hampshire", "NH"),
    ("New Jersey", "NJ"),
    ("New Mexico", "NM"),
    ("New York", "NY"),
    ("North Carolina", "NC"),
    ("North Dakota", "ND"),
    ("Ohio", "OH"),
    ("Oklahoma", "OK"),
    ("Oregon", "OR"),
    ("Pennsylvania", "PA"),
    ("Rhode Island", "RI"),
    ("South Carolina", "SC"),
    ("South Dakota", "SD"),
    ("Tennessee", "TN"),
    ("Texas", "TX"),
    ("Utah", "UT"),
    ("Vermont", "VT"),
    ("Virginia", "VA"),
    ("Washington", "WA"),
    ("West Virginia", "WV"),
    ("Wisconsin", "WI"),
    ("Wyoming", "WY"),
];
