use std::num::NonZeroUsize;
use std::path::Path;

use glean_core::{SourceId, Target};
use url::Url;

/// URL of the `n`th test source.
pub fn source_url(n: usize) -> String {
    format!("https://names.example.com/generator/{n}")
}

/// Target for the `n`th test source, writing into `dir`.
pub fn make_target(dir: &Path, n: usize, threshold: usize) -> Target {
    Target::new(
        SourceId::new(Url::parse(&source_url(n)).unwrap(), "#result"),
        dir.join(format!("names_{n}.txt")),
        NonZeroUsize::new(threshold).unwrap(),
    )
}

pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}
