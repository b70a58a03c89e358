//! File-list front end.
//!
//! Builds a directive list from a set of files and an option map from role
//! names to file-name suffixes, e.g. `diffuseColor -> "_albedo"` or
//! `metallic -> "_mr:r"`.

use std::collections::BTreeMap;
use std::path::Path;

use crate::import::SourceFormat;
use crate::material::{ChannelRole, Channels};

/// Build directive tokens for `files`.
///
/// Files with a supported source extension become positional arguments. For
/// every role in `options`, each file whose stem ends with the role's suffix
/// emits `-<role> [channel] <file>`.
pub fn arguments_from_files<S: AsRef<str>>(files: &[S], options: &BTreeMap<String, String>) -> Vec<String> {
    let mut arguments = Vec::new();

    for file in files {
        let file = file.as_ref();
        if SourceFormat::from_path(Path::new(file)).is_some() {
            arguments.push(file.to_string());
        }
    }

    for role in ChannelRole::ALL {
        let Some(option) = options.get(role.name()) else {
            continue;
        };

        let parts: Vec<&str> = option.split(':').collect();
        let (suffix, channel) = match parts.as_slice() {
            [suffix, channel] => {
                let selector = Channels::from_selector(channel);
                if selector.is_none() {
                    log::warn!(
                        "invalid channel '{}' for argument {}, using default channels",
                        channel,
                        role
                    );
                }
                (*suffix, selector)
            }
            _ => (option.as_str(), None),
        };

        for file in files {
            let file = file.as_ref();
            if !stem_matches(file, suffix) {
                continue;
            }
            arguments.push(format!("-{}", role));
            if let Some(channel) = channel {
                arguments.push(channel.to_string());
            }
            arguments.push(file.to_string());
        }
    }

    log::debug!("Arguments from files: {:?}", arguments);
    arguments
}

// The stem keeps its directory part; only the extension is dropped.
fn stem_matches(file: &str, suffix: &str) -> bool {
    let path = Path::new(file);
    let stem = match path.extension() {
        Some(ext) => &file[..file.len() - ext.len() - 1],
        None => file,
    };
    stem.len() > suffix.len() && stem.ends_with(suffix)
}
