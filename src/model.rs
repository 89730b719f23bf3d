use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Unix timestamp of `0001-01-01T00:00:00Z`, which some producers send instead of `null`.
const ZERO_TIMESTAMP_SECS: i64 = -62_135_596_800;

/// Top-level request payload of a sync run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    #[serde(default)]
    pub drive_settings: Vec<DriveSyncSettings>,
    /// Zero selects the planner's default.
    #[serde(default)]
    pub batch_size: usize,
}

/// Identifies a group of drives and the file settings applying to them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriveSyncSettings {
    #[serde(default, alias = "patterns")]
    pub name_patterns: Vec<String>,
    #[serde(default)]
    pub file_settings: Vec<FileSyncSettings>,
}

/// Which files of a drive group are included in a sync.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileSyncSettings {
    /// `None` means no lower bound.
    #[serde(default, deserialize_with = "deserialize_since")]
    pub since_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ignore_private: bool,
    #[serde(default)]
    pub ignore_deleted: bool,
}

impl SyncSettings {
    pub fn effective_batch_size(&self, default: usize) -> usize {
        if self.batch_size == 0 {
            default
        } else {
            self.batch_size
        }
    }

    /// Every group's file settings collapsed into one.
    pub fn effective_file_settings(&self) -> Option<FileSyncSettings> {
        FileSyncSettings::merge_all(self.drive_settings.iter().flat_map(|g| &g.file_settings))
    }
}

impl DriveSyncSettings {
    /// The group's file settings collapsed into one, or `None` when it has none.
    pub fn effective_file_settings(&self) -> Option<FileSyncSettings> {
        FileSyncSettings::merge_all(&self.file_settings)
    }
}

impl FileSyncSettings {
    /// Fold `other` into `self`, keeping whatever either side would include.
    ///
    /// An unset cutoff absorbs any timestamp; otherwise the earliest cutoff
    /// wins. A restriction survives only if both sides ask for it.
    pub fn merge(&mut self, other: &FileSyncSettings) {
        self.since_date_time = match (self.since_date_time, other.since_date_time) {
            (Some(ours), Some(theirs)) => Some(ours.min(theirs)),
            _ => None,
        };
        self.ignore_private &= other.ignore_private;
        self.ignore_deleted &= other.ignore_deleted;
    }

    /// Reduce a list of settings with [`merge`](Self::merge), starting from the first one.
    pub fn merge_all<'a, I>(settings: I) -> Option<FileSyncSettings>
    where
        I: IntoIterator<Item = &'a FileSyncSettings>,
    {
        let mut iter = settings.into_iter();
        let mut acc = iter.next()?.clone();
        for next in iter {
            acc.merge(next);
        }
        Some(acc)
    }
}

fn deserialize_since<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<DateTime<Utc>>::deserialize(deserializer)?;
    Ok(value.filter(|ts| ts.timestamp() != ZERO_TIMESTAMP_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    fn fs(since: Option<DateTime<Utc>>, ignore_private: bool, ignore_deleted: bool) -> FileSyncSettings {
        FileSyncSettings {
            since_date_time: since,
            ignore_private,
            ignore_deleted,
        }
    }

    fn samples() -> Vec<FileSyncSettings> {
        let mut out = Vec::new();
        for since in [None, Some(at(1)), Some(at(20))] {
            for ignore_private in [false, true] {
                for ignore_deleted in [false, true] {
                    out.push(fs(since, ignore_private, ignore_deleted));
                }
            }
        }
        out
    }

    #[test]
    fn merge_is_idempotent() {
        for f in samples() {
            let mut merged = f.clone();
            merged.merge(&f);
            assert_eq!(merged, f);
        }
    }

    #[test]
    fn merge_is_symmetric() {
        for f in samples() {
            for o in samples() {
                let mut left = f.clone();
                left.merge(&o);
                let mut right = o.clone();
                right.merge(&f);
                assert_eq!(left, right, "merge({f:?}, {o:?})");
            }
        }
    }

    #[test]
    fn merge_all_ignores_fold_order() {
        let list = vec![fs(Some(at(20)), true, false), fs(Some(at(5)), true, true), fs(Some(at(9)), false, true)];
        let forward = FileSyncSettings::merge_all(&list).unwrap();
        let backward = FileSyncSettings::merge_all(list.iter().rev()).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward, fs(Some(at(5)), false, false));
    }

    #[test]
    fn merge_keeps_inclusive_side() {
        for f in samples() {
            for o in samples() {
                let mut merged = f.clone();
                merged.merge(&o);
                if !f.ignore_private || !o.ignore_private {
                    assert!(!merged.ignore_private);
                }
                if f.since_date_time.is_none() || o.since_date_time.is_none() {
                    assert_eq!(merged.since_date_time, None);
                }
            }
        }
    }

    #[test]
    fn merge_unset_cutoff_with_restricted() {
        let mut target = fs(None, true, true);
        let other = fs(Some(at(3)), false, true);
        target.merge(&other);
        assert_eq!(target, fs(None, false, true));
        // other is left untouched
        assert_eq!(other, fs(Some(at(3)), false, true));
    }

    #[test]
    fn merge_picks_earliest_cutoff() {
        let mut target = fs(Some(at(10)), false, false);
        target.merge(&fs(Some(at(2)), false, false));
        assert_eq!(target.since_date_time, Some(at(2)));
    }

    #[test]
    fn merge_all_of_empty_is_none() {
        let empty: Vec<FileSyncSettings> = Vec::new();
        assert_eq!(FileSyncSettings::merge_all(&empty), None);
        assert_eq!(DriveSyncSettings::default().effective_file_settings(), None);
    }

    #[test]
    fn effective_batch_size_substitutes_default() {
        let settings = SyncSettings::default();
        assert_eq!(settings.effective_batch_size(200), 200);
        let settings = SyncSettings { batch_size: 7, ..Default::default() };
        assert_eq!(settings.effective_batch_size(200), 7);
    }

    #[test]
    fn effective_file_settings_spans_all_groups() {
        let settings = SyncSettings {
            drive_settings: vec![
                DriveSyncSettings {
                    name_patterns: vec![".*\\.docx".into()],
                    file_settings: vec![fs(Some(at(10)), true, true)],
                },
                DriveSyncSettings::default(),
                DriveSyncSettings {
                    name_patterns: vec![".*\\.pdf".into()],
                    file_settings: vec![fs(Some(at(4)), true, false)],
                },
            ],
            batch_size: 0,
        };
        assert_eq!(settings.effective_file_settings(), Some(fs(Some(at(4)), true, false)));
        assert_eq!(SyncSettings::default().effective_file_settings(), None);
    }

    #[test]
    fn parse_wire_payload() {
        let raw = r#"{
            "driveSettings": [
                {
                    "namePatterns": ["drive-1*"],
                    "fileSettings": [
                        {"sinceDateTime": "2024-03-01T12:00:00Z", "ignorePrivate": true, "ignoreDeleted": false},
                        {"sinceDateTime": null, "ignorePrivate": true, "ignoreDeleted": true},
                        {"sinceDateTime": "0001-01-01T00:00:00Z", "ignorePrivate": false, "ignoreDeleted": true},
                        {"ignorePrivate": false}
                    ]
                },
                {"patterns": ["legacy-*"], "fileSettings": []}
            ],
            "batchSize": 50
        }"#;
        let settings: SyncSettings = serde_json::from_str(raw).unwrap();
        assert_eq!(settings.batch_size, 50);
        let files = &settings.drive_settings[0].file_settings;
        assert_eq!(files[0].since_date_time, Some(at(1)));
        assert_eq!(files[1].since_date_time, None);
        assert_eq!(files[2].since_date_time, None);
        assert_eq!(files[3], FileSyncSettings::default());
        assert_eq!(settings.drive_settings[1].name_patterns, vec!["legacy-*".to_string()]);
    }

    #[test]
    fn serialize_uses_camel_case() {
        let value = serde_json::to_value(fs(None, true, false)).unwrap();
        assert_eq!(value["sinceDateTime"], serde_json::Value::Null);
        assert_eq!(value["ignorePrivate"], true);
        assert_eq!(value["ignoreDeleted"], false);
    }
}
