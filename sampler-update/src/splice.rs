//! Splicing encoder output into `sampler.html`

use lazy_static::lazy_static;
use regex::{NoExpand, Regex};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SpliceError {
    #[error("could not find decoder and paths sections in encoded output")]
    MissingSections,
    #[error("could not find PATHS section in sampler.html")]
    NoPathsSection,
    #[error("found multiple PATHS sections ({0}) in sampler.html")]
    MultiplePathsSections(usize),
}

lazy_static! {
    /// From the decoder comment through the end of `const PATHS = {...};`
    static ref PATHS_BLOCK_RE: Regex = Regex::new(
        r"(?s)// Path decoder.*?\nfunction Q\(\[e\]\)\{.*?\}\n// Encoded paths.*?\n// To regenerate:.*?\nconst PATHS = \{.*?\n\};"
    ).unwrap();

    /// Per-icon-type rendering options and the `getOpts` function using them
    static ref GET_OPTS_RE: Regex = Regex::new(
        r"(?s)// Rendering options based on icon type\nconst STROKE_KEYS = \[.*?\];\nconst DOT_KEYS = \[.*?\];\n\nfunction getOpts\(name, size\) \{.*?\n\}"
    ).unwrap();
}

/// `getOpts` rendering every path with the same stroke and fill
const UNIFORM_GET_OPTS: &str = r##"// Rendering options - all paths use the same stroke and fill
function getOpts(name, size) {
  const baseThickness = size / 32;
  return { fill: "#e8e8ff", stroke: "#333", thickness: Math.max(1, baseThickness) };
}"##;

/// The parts of the encoder output that go into `sampler.html`
#[derive(Debug, PartialEq, Eq)]
pub struct Sections {
    /// Decoder comment and function, each on its own line
    pub decoder: String,
    /// From the `// Encoded paths` comment through the end of `const PATHS = {...};`
    pub paths: String,
}

/// Find the decoder and the paths object in the output of `path-codec.js --encode-all`
///
/// The decoder is formed by the last decoder comment and function seen before the paths
/// section starts.
pub fn extract_sections(encoded_output: &str) -> Result<Sections, SpliceError> {
    let lines = encoded_output.split('\n').collect::<Vec<_>>();

    let mut decoder_comment = None;
    let mut decoder_fn = None;
    let mut paths_start = None;
    for (i, line) in lines.iter().enumerate() {
        if line.starts_with("// Path decoder") {
            decoder_comment = Some(*line);
        } else if line.starts_with("function Q") {
            decoder_fn = Some(*line);
        } else if line.starts_with("// Encoded paths") {
            paths_start = Some(i);
            break;
        }
    }
    let (Some(comment), Some(function), Some(paths_start)) =
        (decoder_comment, decoder_fn, paths_start)
    else {
        return Err(SpliceError::MissingSections);
    };

    let mut paths = Vec::new();
    let mut in_paths = false;
    let mut depth: i64 = 0;
    for line in &lines[paths_start..] {
        paths.push(*line);
        let balance = line.matches('{').count() as i64 - line.matches('}').count() as i64;
        if line.contains("const PATHS = {") {
            in_paths = true;
            depth = balance;
        } else if in_paths {
            depth += balance;
            if depth == 0 && line.trim() == "};" {
                break;
            }
        }
    }

    Ok(Sections {
        decoder: format!("{comment}\n{function}\n"),
        paths: paths.join("\n"),
    })
}

/// What [`update_sampler_html`] changed
#[derive(Debug, PartialEq, Eq)]
pub struct Update {
    pub content: String,
    /// Number of decoder and paths blocks replaced, always one
    pub paths_replaced: usize,
    pub get_opts_replaced: bool,
}

/// Replace the decoder and paths block of `html` with `sections`, and make all icons render
/// with the same options
pub fn update_sampler_html(html: &str, sections: &Sections) -> Result<Update, SpliceError> {
    let count = PATHS_BLOCK_RE.find_iter(html).count();
    match count {
        0 => return Err(SpliceError::NoPathsSection),
        1 => {}
        n => return Err(SpliceError::MultiplePathsSections(n)),
    }

    let replacement = format!("{}\n{}", sections.decoder.trim_end(), sections.paths);
    let content = PATHS_BLOCK_RE.replace(html, NoExpand(&replacement));

    let get_opts_replaced = GET_OPTS_RE.is_match(&content);
    let content = GET_OPTS_RE
        .replace_all(&content, NoExpand(UNIFORM_GET_OPTS))
        .into_owned();

    Ok(Update {
        content,
        paths_replaced: count,
        get_opts_replaced,
    })
}
