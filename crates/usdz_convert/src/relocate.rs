//! Texture relocation.
//!
//! Texture paths given on the command line are relative to wherever the user
//! happened to be. Before a material is written, each texture is copied into
//! the working folder under a path the packaged layer can resolve, and the
//! input is rewritten when that path differs from what was given.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::ConvertResult;
use crate::material::MaterialSpec;

/// Copies textures into the working folder, at most once per source file.
#[derive(Debug)]
pub struct TextureRelocator {
    source_dir: PathBuf,
    destination_dir: PathBuf,
    working_dir: PathBuf,

    /// Resolved source file -> relative path inside the working folder
    ledger: HashMap<PathBuf, String>,
}

fn dir_or_current(dir: &Path) -> PathBuf {
    if dir.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        dir.to_path_buf()
    }
}

impl TextureRelocator {
    pub fn new(source_dir: &Path, destination_dir: &Path, working_dir: &Path) -> Self {
        Self {
            source_dir: dir_or_current(source_dir),
            destination_dir: dir_or_current(destination_dir),
            working_dir: working_dir.to_path_buf(),
            ledger: HashMap::new(),
        }
    }

    /// Number of distinct source files copied so far.
    pub fn copied_count(&self) -> usize {
        self.ledger.len()
    }

    /// Relocate every texture input of `spec`, rewriting file paths in place.
    pub fn relocate(&mut self, spec: &mut MaterialSpec) -> ConvertResult<()> {
        for (role, map) in spec.textures_mut() {
            if map.file.is_empty() {
                continue;
            }
            match self.relocate_file(&map.file)? {
                Some(relative) => {
                    if relative != map.file {
                        log::debug!("Texture {} for {} relocated to {}", map.file, role, relative);
                    }
                    map.file = relative;
                }
                None => log::warn!("texture file {} for {} not found", map.file, role),
            }
        }
        Ok(())
    }

    /// Copy one texture into the working folder.
    ///
    /// Returns the path to author on the texture node, or `None` when the
    /// file could not be found.
    pub fn relocate_file(&mut self, file: &str) -> ConvertResult<Option<String>> {
        let Some((source, relative)) = self.resolve(file) else {
            return Ok(None);
        };

        let key = fs::canonicalize(&source).unwrap_or_else(|_| source.clone());
        if let Some(existing) = self.ledger.get(&key) {
            return Ok(Some(existing.clone()));
        }

        let target = self.working_dir.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&source, &target)?;
        log::debug!("Copied {} to {}", source.display(), target.display());

        self.ledger.insert(key, relative.clone());
        Ok(Some(relative))
    }

    /// Find the texture and the relative path it gets in the working folder.
    fn resolve(&self, file: &str) -> Option<(PathBuf, String)> {
        let given = Path::new(file);
        let distinct_destination = self.destination_dir != self.source_dir;

        if given.is_relative() {
            let mut dirs = vec![&self.source_dir];
            if distinct_destination {
                dirs.push(&self.destination_dir);
            }
            for dir in dirs {
                let candidate = dir.join(given);
                if !candidate.is_file() {
                    continue;
                }
                // Paths leaving the folder cannot live under the working folder.
                if leaves_folder(given) {
                    let relative = textures_path(&candidate)?;
                    return Some((candidate, relative));
                }
                return Some((candidate, file.to_string()));
            }
        }

        if !given.is_file() {
            return None;
        }

        if let Some(relative) = strip_dir(given, &self.source_dir) {
            return Some((given.to_path_buf(), relative));
        }
        if distinct_destination {
            if let Some(relative) = strip_dir(given, &self.destination_dir) {
                return Some((given.to_path_buf(), relative));
            }
        }

        Some((given.to_path_buf(), textures_path(given)?))
    }
}

fn textures_path(file: &Path) -> Option<String> {
    let basename = file.file_name()?.to_string_lossy();
    Some(format!("textures/{}", basename))
}

fn leaves_folder(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}

fn strip_dir(file: &Path, dir: &Path) -> Option<String> {
    if dir == Path::new(".") {
        return None;
    }
    let remainder = file.strip_prefix(dir).ok()?;
    if remainder.as_os_str().is_empty() || leaves_folder(remainder) {
        return None;
    }
    Some(remainder.to_string_lossy().replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{ChannelRole, Input, TextureMap};

    fn texture_spec(files: &[(ChannelRole, &str)]) -> MaterialSpec {
        let mut spec = MaterialSpec::named("body");
        for (role, file) in files {
            spec.set_input(
                *role,
                Input::Texture(TextureMap {
                    file: file.to_string(),
                    channels: role.default_channels(),
                    fallback: None,
                    tex_coord_set: "st".into(),
                }),
            );
        }
        spec
    }

    fn file_of(spec: &MaterialSpec, role: ChannelRole) -> String {
        match spec.inputs.get(&role) {
            Some(Input::Texture(map)) => map.file.clone(),
            other => panic!("unexpected input {:?}", other),
        }
    }

    #[test]
    fn test_relative_to_source() {
        let source = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        fs::create_dir(source.path().join("maps")).unwrap();
        fs::write(source.path().join("maps/albedo.png"), b"png").unwrap();

        let mut relocator = TextureRelocator::new(source.path(), source.path(), work.path());
        let mut spec = texture_spec(&[(ChannelRole::DiffuseColor, "maps/albedo.png")]);
        relocator.relocate(&mut spec).unwrap();

        assert_eq!(file_of(&spec, ChannelRole::DiffuseColor), "maps/albedo.png");
        assert!(work.path().join("maps/albedo.png").is_file());
    }

    #[test]
    fn test_relative_to_destination() {
        let source = tempfile::tempdir().unwrap();
        let destination = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        fs::write(destination.path().join("ao.png"), b"png").unwrap();

        let mut relocator = TextureRelocator::new(source.path(), destination.path(), work.path());
        let mut spec = texture_spec(&[(ChannelRole::Occlusion, "ao.png")]);
        relocator.relocate(&mut spec).unwrap();

        assert_eq!(file_of(&spec, ChannelRole::Occlusion), "ao.png");
        assert!(work.path().join("ao.png").is_file());
    }

    #[test]
    fn test_absolute_under_source_is_stripped() {
        let source = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        fs::create_dir(source.path().join("tex")).unwrap();
        let absolute = source.path().join("tex/n.png");
        fs::write(&absolute, b"png").unwrap();

        let mut relocator = TextureRelocator::new(source.path(), source.path(), work.path());
        let mut spec = texture_spec(&[(ChannelRole::Normal, absolute.to_str().unwrap())]);
        relocator.relocate(&mut spec).unwrap();

        assert_eq!(file_of(&spec, ChannelRole::Normal), "tex/n.png");
        assert!(work.path().join("tex/n.png").is_file());
    }

    #[test]
    fn test_elsewhere_goes_to_textures() {
        let source = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let absolute = elsewhere.path().join("rough.png");
        fs::write(&absolute, b"png").unwrap();

        let mut relocator = TextureRelocator::new(source.path(), source.path(), work.path());
        let mut spec = texture_spec(&[(ChannelRole::Roughness, absolute.to_str().unwrap())]);
        relocator.relocate(&mut spec).unwrap();

        assert_eq!(file_of(&spec, ChannelRole::Roughness), "textures/rough.png");
        assert!(work.path().join("textures/rough.png").is_file());
    }

    #[test]
    fn test_parent_relative_goes_to_textures() {
        let root = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let models = root.path().join("models");
        fs::create_dir(&models).unwrap();
        fs::create_dir(root.path().join("tex")).unwrap();
        fs::write(root.path().join("tex/a.png"), b"png").unwrap();

        let mut relocator = TextureRelocator::new(&models, &models, work.path());
        let mut spec = texture_spec(&[(ChannelRole::DiffuseColor, "../tex/a.png")]);
        relocator.relocate(&mut spec).unwrap();

        assert_eq!(file_of(&spec, ChannelRole::DiffuseColor), "textures/a.png");
        assert!(work.path().join("textures/a.png").is_file());
        let entries: Vec<_> = fs::read_dir(work.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(entries, vec!["textures"]);
        assert_eq!(relocator.copied_count(), 1);
    }

    #[test]
    fn test_shared_texture_copied_once() {
        let source = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        fs::write(source.path().join("mr.png"), b"png").unwrap();

        let mut relocator = TextureRelocator::new(source.path(), source.path(), work.path());
        let mut spec = texture_spec(&[(ChannelRole::Metallic, "mr.png"), (ChannelRole::Roughness, "mr.png")]);
        relocator.relocate(&mut spec).unwrap();

        assert_eq!(relocator.copied_count(), 1);
        assert_eq!(file_of(&spec, ChannelRole::Metallic), "mr.png");
        assert_eq!(file_of(&spec, ChannelRole::Roughness), "mr.png");
    }

    #[test]
    fn test_missing_texture_untouched() {
        let source = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();

        let mut relocator = TextureRelocator::new(source.path(), source.path(), work.path());
        let mut spec = texture_spec(&[(ChannelRole::Opacity, "missing.png")]);
        relocator.relocate(&mut spec).unwrap();

        assert_eq!(file_of(&spec, ChannelRole::Opacity), "missing.png");
        assert_eq!(relocator.copied_count(), 0);
    }
}
