/// Maps tablets to their storage locations.
pub trait LocationProvider: Send + Sync {
    /// Root location of a tablet's files.
    fn root_location(&self, tablet_id: i64) -> String;

    fn segment_location(&self, tablet_id: i64, segment_name: &str) -> String {
        join_path(&self.root_location(tablet_id), &format!("data/{segment_name}"))
    }

    fn metadata_location(&self, tablet_id: i64, version: i64) -> String {
        join_path(
            &self.root_location(tablet_id),
            &format!("meta/{tablet_id:016X}_{version:016X}.meta"),
        )
    }
}

/// Every tablet lives under the same root.
#[derive(Debug, Clone)]
pub struct FixedLocationProvider {
    root: String,
}

impl FixedLocationProvider {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}

impl LocationProvider for FixedLocationProvider {
    fn root_location(&self, _tablet_id: i64) -> String {
        self.root.clone()
    }
}

fn join_path(root: &str, path: &str) -> String {
    format!("{}/{}", root.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locations_under_root() {
        let provider = FixedLocationProvider::new("s3://bucket/db/");
        assert_eq!(provider.root_location(10), "s3://bucket/db/");
        assert_eq!(
            provider.segment_location(10, "seg_1.dat"),
            "s3://bucket/db/data/seg_1.dat"
        );
        assert_eq!(
            provider.metadata_location(10, 3),
            "s3://bucket/db/meta/000000000000000A_0000000000000003.meta"
        );
    }
}
