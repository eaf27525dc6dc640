// In-memory store of captured pose samples

use crate::models::pose::PoseSample;

/// Append-only, insertion-ordered collection of captured poses.
///
/// Lives for the whole session; nothing removes samples short of dropping the store.
#[derive(Debug, Default)]
pub struct PoseStore {
    samples: Vec<PoseSample>,
}

impl PoseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample at the end; returns its position
    pub fn append(&mut self, sample: PoseSample) -> usize {
        self.samples.push(sample);
        self.samples.len() - 1
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[PoseSample] {
        &self.samples
    }

    /// Serialize every sample, in capture order, as a pretty-printed JSON list
    /// of `{points, label}` records
    pub fn export_all(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(&self.samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(value: f32, label: &str) -> PoseSample {
        PoseSample::new(vec![value; 63], label).unwrap()
    }

    #[test]
    fn test_append_preserves_order() {
        let mut store = PoseStore::new();
        assert_eq!(store.append(sample(0.1, "open")), 0);
        assert_eq!(store.append(sample(0.2, "fist")), 1);

        let labels: Vec<&str> = store.samples().iter().map(|s| s.label()).collect();
        assert_eq!(labels, vec!["open", "fist"]);
    }

    #[test]
    fn test_export_empty_store() {
        let store = PoseStore::new();
        let bytes = store.export_all().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "[]");
    }

    #[test]
    fn test_export_record_shape() {
        let mut store = PoseStore::new();
        store.append(sample(0.5, "open"));

        let bytes = store.export_all().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let record = &value[0];
        assert_eq!(record["label"], "open");
        assert_eq!(record["points"].as_array().unwrap().len(), 63);
    }

    #[test]
    fn test_export_roundtrip() {
        let mut store = PoseStore::new();
        store.append(sample(0.25, "open"));
        store.append(sample(0.75, "fist"));

        let bytes = store.export_all().unwrap();
        let parsed: Vec<PoseSample> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, store.samples());
    }
}
