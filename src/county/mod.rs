//! Per-county choropleth batches.
//!
//! A zipped county shapefile is loaded once ([`shapes::load_counties`]),
//! filtered to one state, and for every county a map with that county
//! highlighted ([`render::render_choropleth`]) is composed onto the template
//! as the overlay, with text filled from [`CountyConfig::text_pattern`].
//! Results go through the same collector as the line batch, so naming,
//! progress and the archive behave identically.

pub mod render;
pub mod shapes;

use crate::batch::BatchCollector;
use crate::compose::{self, write_atomic, write_atomic_blocking};
use crate::config::{ComposeConfig, CountyConfig};
use crate::error::{ImprintError, LineError};
use crate::output::BatchOutput;
use crate::pipeline::archive::sanitize_file_stem;
use crate::pipeline::input::Assets;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

/// One county polygon set with its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct County {
    /// Unique id (FIPS `GEOID` by default).
    pub id: String,
    pub name: String,
    /// State code as stored in the attribute table; empty if absent.
    pub state: String,
    /// Rings in lon/lat; outer rings and holes alike.
    pub rings: Vec<Vec<(f64, f64)>>,
}

/// A state code and how many counties the shapefile holds for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSummary {
    pub state: String,
    pub counties: usize,
}

/// Distinct state codes in `counties`, sorted, with county counts.
pub fn list_states(counties: &[County]) -> Vec<StateSummary> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for county in counties {
        *counts.entry(county.state.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(state, counties)| StateSummary {
            state: state.to_string(),
            counties,
        })
        .collect()
}

/// Load a zipped shapefile and summarise the states it covers.
pub fn inspect_shapefile(
    zip_bytes: &[u8],
    config: &CountyConfig,
) -> Result<Vec<StateSummary>, ImprintError> {
    let counties = shapes::load_counties(zip_bytes, &config.fields)?;
    Ok(list_states(&counties))
}

/// Whether a stored state code equals the requested one.
///
/// Codes compare as trimmed strings, or as integers when both parse, so
/// `6` selects `06`.
pub fn state_matches(stored: &str, wanted: &str) -> bool {
    let (stored, wanted) = (stored.trim(), wanted.trim());
    if stored == wanted {
        return true;
    }
    match (stored.parse::<u32>(), wanted.parse::<u32>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Replace `{name}`, `{id}` and `{state}` in `pattern`.
pub fn fill_pattern(pattern: &str, county: &County) -> String {
    pattern
        .replace("{name}", &county.name)
        .replace("{id}", &county.id)
        .replace("{state}", &county.state)
}

/// Counties of `state`, sorted by name then id.
pub fn counties_in_state(counties: Vec<County>, state: &str) -> Vec<County> {
    let mut selected: Vec<County> = counties
        .into_iter()
        .filter(|c| state_matches(&c.state, state))
        .collect();
    selected.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    selected
}

/// File stems from `pattern`, one per county. A stem that more than one
/// county would get (Baltimore County and Baltimore city) gets `_{id}`
/// appended for each of them.
pub fn unique_stems(counties: &[County], pattern: &str) -> Vec<String> {
    let stems: Vec<String> = counties.iter().map(|c| fill_pattern(pattern, c)).collect();
    let mut uses: HashMap<String, usize> = HashMap::new();
    for stem in &stems {
        *uses.entry(sanitize_file_stem(stem)).or_default() += 1;
    }
    stems
        .into_iter()
        .zip(counties)
        .map(|(stem, county)| {
            if uses[&sanitize_file_stem(&stem)] > 1 {
                debug!("Stem '{}' is shared, using '{}_{}'", stem, stem, county.id);
                format!("{stem}_{}", county.id)
            } else {
                stem
            }
        })
        .collect()
}

/// Generate one image per county of `state` and package them into a ZIP.
///
/// The state map only includes that state's counties, so every image shows
/// the same outline with a different county highlighted.
///
/// # Errors
/// * [`ImprintError::ShapefileRead`] when the archive cannot be read
/// * [`ImprintError::NoCountiesFound`] when the state has no counties
/// * [`ImprintError::MissingFont`] when the text pattern yields text but no
///   font is loaded
pub fn generate_county_batch(
    shapefile_zip: &[u8],
    state: &str,
    assets: &Assets,
    config: &ComposeConfig,
    county_config: &CountyConfig,
) -> Result<BatchOutput, ImprintError> {
    let all = shapes::load_counties(shapefile_zip, &county_config.fields)?;
    let counties = counties_in_state(all, state);
    if counties.is_empty() {
        return Err(ImprintError::NoCountiesFound {
            state: state.to_string(),
            field: county_config.fields.state.clone(),
        });
    }
    info!("Generating {} county image(s) for state {}", counties.len(), state);

    let mut collector = BatchCollector::new(counties.len(), config.progress_callback.clone());
    let stems = unique_stems(&counties, &county_config.name_pattern);

    for (idx, (county, stem)) in counties.iter().zip(&stems).enumerate() {
        let index = idx + 1;
        let map = render::render_choropleth(&counties, Some(&county.id), &county_config.map);
        let text = fill_pattern(&county_config.text_pattern, county);
        debug!("County {}/{}: {} ({})", index, counties.len(), county.name, county.id);

        match compose::compose(
            &assets.template,
            Some(&map),
            Some(&text),
            assets.font.as_ref(),
            config,
        ) {
            Ok(generated) => collector.push(index, stem, None, generated),
            Err(ImprintError::MissingFont) => return Err(ImprintError::MissingFont),
            Err(e) => collector.skip(LineError::Compose {
                line: index,
                detail: e.to_string(),
            }),
        }
    }

    collector.finish()
}

/// Run [`generate_county_batch`] off the async runtime and write the ZIP.
pub async fn generate_county_batch_to_file(
    shapefile_zip: Vec<u8>,
    state: &str,
    assets: &Assets,
    output_path: impl AsRef<Path>,
    config: &ComposeConfig,
    county_config: &CountyConfig,
) -> Result<BatchOutput, ImprintError> {
    let state = state.to_string();
    let assets = assets.clone();
    let config = config.clone();
    let county_config = county_config.clone();

    let output = tokio::task::spawn_blocking(move || {
        generate_county_batch(&shapefile_zip, &state, &assets, &config, &county_config)
    })
    .await
    .map_err(|e| ImprintError::Internal(format!("County task panicked: {e}")))??;

    let path = output_path.as_ref();
    write_atomic(path, &output.archive, "zip.tmp").await?;
    info!("Wrote {} ({} bytes)", path.display(), output.archive.len());
    Ok(output)
}

/// Synchronous counterpart of [`generate_county_batch_to_file`].
pub fn generate_county_batch_sync(
    shapefile_zip: &[u8],
    state: &str,
    assets: &Assets,
    output_path: impl AsRef<Path>,
    config: &ComposeConfig,
    county_config: &CountyConfig,
) -> Result<BatchOutput, ImprintError> {
    let output = generate_county_batch(shapefile_zip, state, assets, config, county_config)?;
    write_atomic_blocking(output_path.as_ref(), &output.archive, "zip.tmp")?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::shapes::fixture::{square, zip_archive, Feature};
    use super::*;
    use image::{Rgba, RgbaImage};

    fn shapefile() -> Vec<u8> {
        zip_archive(&[
            Feature {
                id: "06003",
                name: "Alpine",
                state: "06",
                rings: vec![square(-120.0, 38.0, 1.0)],
            },
            Feature {
                id: "32003",
                name: "Clark",
                state: "32",
                rings: vec![square(-115.0, 36.0, 1.0)],
            },
            Feature {
                id: "06001",
                name: "Alameda",
                state: "06",
                rings: vec![square(-122.0, 37.0, 1.0)],
            },
        ])
    }

    fn no_text() -> CountyConfig {
        CountyConfig {
            text_pattern: String::new(),
            ..CountyConfig::default()
        }
    }

    fn assets() -> Assets {
        Assets::new(RgbaImage::from_pixel(200, 200, Rgba([255, 255, 255, 255])))
    }

    fn layout() -> ComposeConfig {
        ComposeConfig::builder()
            .overlay_box(0, 0, 100, 100)
            .build()
            .unwrap()
    }

    fn county(name: &str, id: &str, state: &str) -> County {
        County {
            id: id.into(),
            name: name.into(),
            state: state.into(),
            rings: vec![square(0.0, 0.0, 1.0)],
        }
    }

    #[test]
    fn state_codes_match_numerically() {
        assert!(state_matches("06", "6"));
        assert!(state_matches(" 06", "06"));
        assert!(state_matches("CA", "CA"));
        assert!(!state_matches("06", "32"));
        assert!(!state_matches("CA", "06"));
    }

    #[test]
    fn fills_all_placeholders() {
        let c = county("Alameda", "06001", "06");
        assert_eq!(
            fill_pattern("{name} County ({id}, {state})", &c),
            "Alameda County (06001, 06)"
        );
        assert_eq!(fill_pattern("static", &c), "static");
    }

    #[test]
    fn lists_states_with_counts() {
        let counties = vec![
            county("A", "1", "32"),
            county("B", "2", "06"),
            county("C", "3", "06"),
        ];
        let states = list_states(&counties);
        assert_eq!(
            states,
            vec![
                StateSummary { state: "06".into(), counties: 2 },
                StateSummary { state: "32".into(), counties: 1 },
            ]
        );
    }

    #[test]
    fn inspect_reads_the_archive() {
        let states = inspect_shapefile(&shapefile(), &CountyConfig::default()).unwrap();
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].counties, 2);
    }

    #[test]
    fn batch_covers_state_sorted_by_name() {
        let out = generate_county_batch(&shapefile(), "6", &assets(), &layout(), &no_text()).unwrap();
        let names: Vec<&str> = out.images.iter().map(|i| i.file_name.as_str()).collect();
        assert_eq!(names, vec!["Alameda.png", "Alpine.png"]);
        assert_eq!(out.stats.total_lines, 2);
        assert!(!out.archive.is_empty());
    }

    #[test]
    fn name_pattern_drives_file_names() {
        let cfg = CountyConfig {
            name_pattern: "county_{id}".into(),
            ..no_text()
        };
        let out = generate_county_batch(&shapefile(), "32", &assets(), &layout(), &cfg).unwrap();
        assert_eq!(out.images[0].file_name, "county_32003.png");
    }

    #[test]
    fn same_named_counties_get_distinct_files() {
        let zip = zip_archive(&[
            Feature {
                id: "24510",
                name: "Baltimore",
                state: "24",
                rings: vec![square(-76.7, 39.2, 0.2)],
            },
            Feature {
                id: "24005",
                name: "Baltimore",
                state: "24",
                rings: vec![square(-77.0, 39.2, 0.3)],
            },
            Feature {
                id: "24003",
                name: "Anne Arundel",
                state: "24",
                rings: vec![square(-76.8, 38.8, 0.3)],
            },
        ]);
        let out = generate_county_batch(&zip, "24", &assets(), &layout(), &no_text()).unwrap();
        let names: Vec<&str> = out.images.iter().map(|i| i.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Anne Arundel.png", "Baltimore_24005.png", "Baltimore_24510.png"]
        );
        assert_eq!(out.stats.generated, 3);
        let archive = zip::ZipArchive::new(std::io::Cursor::new(&out.archive)).unwrap();
        assert_eq!(archive.len(), 3);
    }

    #[test]
    fn unique_stems_leave_distinct_names_alone() {
        let counties = vec![
            county("Fairfax", "51059", "51"),
            county("Fairfax", "51600", "51"),
            county("Richmond", "51159", "51"),
        ];
        assert_eq!(
            unique_stems(&counties, "{name}"),
            vec!["Fairfax_51059", "Fairfax_51600", "Richmond"]
        );
        assert_eq!(
            unique_stems(&counties, "{id}"),
            vec!["51059", "51600", "51159"]
        );
    }

    #[test]
    fn map_lands_in_overlay_box() {
        let out = generate_county_batch(&shapefile(), "32", &assets(), &layout(), &no_text()).unwrap();
        let img = image::load_from_memory(&out.images[0].png).unwrap().to_rgba8();
        // A single highlighted county fills the middle of the overlay box.
        assert_eq!(img.get_pixel(50, 50).0, [0x2B, 0x43, 0x96, 255]);
        // Outside the box the template is untouched.
        assert_eq!(img.get_pixel(150, 150).0, [255, 255, 255, 255]);
    }

    #[test]
    fn unknown_state_is_an_error() {
        let err = generate_county_batch(&shapefile(), "99", &assets(), &layout(), &no_text())
            .unwrap_err();
        assert!(matches!(err, ImprintError::NoCountiesFound { ref state, .. } if state == "99"));
    }

    #[test]
    fn default_text_needs_a_font() {
        let err = generate_county_batch(
            &shapefile(),
            "06",
            &assets(),
            &layout(),
            &CountyConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ImprintError::MissingFont));
    }

    #[tokio::test]
    async fn writes_archive_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/counties.zip");
        let out = generate_county_batch_to_file(
            shapefile(),
            "06",
            &assets(),
            &path,
            &layout(),
            &no_text(),
        )
        .await
        .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), out.archive);
    }
}
