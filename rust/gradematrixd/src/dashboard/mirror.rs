use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MirrorTrigger {
    OnSourceChange,
    OnFlagEnabled { flag: String },
}

/// One-way copy of `sources` into each target group, position by position.
/// Nothing ever flows back from a target.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorRule {
    pub sources: Vec<String>,
    pub targets: Vec<Vec<String>>,
    pub trigger: MirrorTrigger,
}

impl MirrorRule {
    pub fn check(&self) -> Result<(), String> {
        if self.sources.is_empty() {
            return Err("mirror rule needs at least one source field".to_string());
        }
        for group in &self.targets {
            if group.len() != self.sources.len() {
                return Err(format!(
                    "target group has {} fields, sources have {}",
                    group.len(),
                    self.sources.len()
                ));
            }
            if let Some(f) = group.iter().find(|f| self.sources.contains(f)) {
                return Err(format!("field {f:?} is both source and target"));
            }
        }
        Ok(())
    }

    /// Copy into `after` as the trigger dictates; returns the target fields
    /// that changed.
    pub fn apply(&self, before: &Map<String, Value>, after: &mut Map<String, Value>) -> Vec<String> {
        let changed = |f: &String| before.get(f) != after.get(f);
        let copy_idx: Vec<usize> = match &self.trigger {
            MirrorTrigger::OnSourceChange => (0..self.sources.len())
                .filter(|&i| changed(&self.sources[i]))
                .collect(),
            MirrorTrigger::OnFlagEnabled { flag } => {
                let on = |m: &Map<String, Value>| m.get(flag).and_then(Value::as_bool) == Some(true);
                let just_enabled = on(after) && !on(before);
                if just_enabled {
                    (0..self.sources.len()).collect()
                } else if on(after) {
                    (0..self.sources.len())
                        .filter(|&i| changed(&self.sources[i]))
                        .collect()
                } else {
                    Vec::new()
                }
            }
        };

        let mut touched = Vec::new();
        for i in copy_idx {
            let value = after.get(&self.sources[i]).cloned().unwrap_or(Value::Null);
            for group in &self.targets {
                let field = &group[i];
                if after.get(field) != Some(&value) {
                    after.insert(field.clone(), value.clone());
                    touched.push(field.clone());
                }
            }
        }
        touched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().expect("object")
    }

    fn guardian_rule(trigger: MirrorTrigger) -> MirrorRule {
        MirrorRule {
            sources: vec!["primaryPhone".into(), "primaryAddress".into()],
            targets: vec![
                vec!["guardianPhone".into(), "guardianAddress".into()],
                vec!["emergencyPhone".into(), "emergencyAddress".into()],
            ],
            trigger,
        }
    }

    #[test]
    fn source_change_copies_only_changed_fields() {
        let rule = guardian_rule(MirrorTrigger::OnSourceChange);
        rule.check().expect("valid");
        let before = obj(json!({ "primaryPhone": "1", "primaryAddress": "A" }));
        let mut after = obj(json!({ "primaryPhone": "2", "primaryAddress": "A", "guardianAddress": "X" }));
        let touched = rule.apply(&before, &mut after);
        assert_eq!(touched, vec!["guardianPhone".to_string(), "emergencyPhone".to_string()]);
        assert_eq!(after["guardianAddress"], "X");
    }

    #[test]
    fn flag_enable_copies_everything_then_tracks_changes() {
        let rule = guardian_rule(MirrorTrigger::OnFlagEnabled {
            flag: "sameAsPrimary".into(),
        });
        let before = obj(json!({ "primaryPhone": "1", "primaryAddress": "A", "sameAsPrimary": false }));
        let mut after = obj(json!({ "primaryPhone": "1", "primaryAddress": "A", "sameAsPrimary": true }));
        assert_eq!(rule.apply(&before, &mut after).len(), 4);
        assert_eq!(after["emergencyAddress"], "A");

        let before = after.clone();
        after.insert("primaryAddress".into(), json!("B"));
        let touched = rule.apply(&before, &mut after);
        assert_eq!(touched, vec!["guardianAddress".to_string(), "emergencyAddress".to_string()]);
    }

    #[test]
    fn flag_off_never_copies_and_targets_never_flow_back() {
        let rule = guardian_rule(MirrorTrigger::OnFlagEnabled {
            flag: "sameAsPrimary".into(),
        });
        let before = obj(json!({ "primaryPhone": "1" }));
        let mut after = obj(json!({ "primaryPhone": "2", "guardianPhone": "9" }));
        assert!(rule.apply(&before, &mut after).is_empty());
        assert_eq!(after["primaryPhone"], "2");
    }

    #[test]
    fn mismatched_groups_are_rejected() {
        let mut rule = guardian_rule(MirrorTrigger::OnSourceChange);
        rule.targets.push(vec!["onlyOne".into()]);
        assert!(rule.check().is_err());
        let mut rule = guardian_rule(MirrorTrigger::OnSourceChange);
        rule.targets[0][0] = "primaryPhone".into();
        assert!(rule.check().is_err());
    }
}
