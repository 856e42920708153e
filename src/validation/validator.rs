use tracing::debug;

use super::form::{sector_requires_cost_center, COST_CENTER_FIELD, SECTOR_FIELD};
use super::{
    FieldError, FieldState, FileField, Form, RuleError, RuleSpec, RuleTable, SectorUpdate,
    SubmitDecision, UploadPolicy,
};

/// Evaluates form input against the rule table and upload policy
#[derive(Debug, Clone)]
pub struct FieldValidator {
    rules: RuleTable,
    uploads: UploadPolicy,
}

impl FieldValidator {
    /// Validator over the builtin rules and default upload policy
    pub fn new() -> Result<Self, RuleError> {
        Ok(Self {
            rules: RuleTable::builtin()?,
            uploads: UploadPolicy::default(),
        })
    }

    /// Validator with configured rules layered over the builtin ones
    pub fn from_config(specs: &[RuleSpec], uploads: UploadPolicy) -> Result<Self, RuleError> {
        Ok(Self {
            rules: RuleTable::with_overrides(specs)?,
            uploads,
        })
    }

    pub fn with_parts(rules: RuleTable, uploads: UploadPolicy) -> Self {
        Self { rules, uploads }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn upload_policy(&self) -> &UploadPolicy {
        &self.uploads
    }

    /// Validate one field in place.
    ///
    /// Fields without a rule are always valid and are left untouched.
    pub fn validate_field(&self, field: &mut FieldState) -> bool {
        let Some(rule) = self.rules.get(&field.name) else {
            return true;
        };

        let errors = rule.check(field.value.trim());
        debug!(field = %field.name, errors = errors.len(), "validated field");
        field.annotate(errors)
    }

    /// Validate the file selected in a file input. No selection is valid.
    pub fn validate_file(&self, input: &mut FileField) -> bool {
        let errors = match &input.selected {
            Some(upload) => self.uploads.check(upload),
            None => Vec::new(),
        };
        debug!(field = %input.name, errors = errors.len(), "validated file");
        input.annotate(errors)
    }

    /// Validate every field and file of the form, then the purchasing
    /// cost-center rule. Every input is evaluated even after a failure.
    pub fn validate_form(&self, form: &mut Form) -> bool {
        let mut valid = true;

        for field in form.fields_mut() {
            valid &= self.validate_field(field);
        }

        for file in form.files_mut() {
            valid &= self.validate_file(file);
        }

        let needs_cost_center = form
            .value(SECTOR_FIELD)
            .map(sector_requires_cost_center)
            .unwrap_or(false);

        if needs_cost_center {
            let cost_center = form.ensure_field(COST_CENTER_FIELD);
            if cost_center.is_blank() {
                cost_center.push_error(FieldError::CostCenterRequired);
                valid = false;
            }
        }

        debug!(valid, "validated form");
        valid
    }

    /// Synchronise the cost-center field and purchasing banner with a new
    /// sector value. Runs on every sector change, ahead of and independent of
    /// submit-time validation.
    pub fn check_compras_setor(&self, value: &str, form: &mut Form) -> SectorUpdate {
        let update = if sector_requires_cost_center(value) {
            SectorUpdate::ShowPurchasingWarning
        } else {
            SectorUpdate::HidePurchasingWarning
        };
        form.apply(update);
        update
    }

    /// Submit handler: the submission is aborted unless the whole form is valid
    pub fn on_submit(&self, form: &mut Form) -> SubmitDecision {
        if self.validate_form(form) {
            SubmitDecision::Proceed
        } else {
            SubmitDecision::Abort {
                invalid_fields: form.invalid_fields(),
            }
        }
    }
}
