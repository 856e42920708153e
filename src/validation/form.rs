use super::{FieldState, FileField};

/// Field holding the sector a ticket is routed to
pub const SECTOR_FIELD: &str = "setor";

/// Field holding the cost center (CDC)
pub const COST_CENTER_FIELD: &str = "cdc";

/// Banner shown while a purchasing sector is selected
pub const PURCHASING_WARNING: &str =
    "Atenção: para o setor COMPRAS é obrigatório informar o CDC. Caso não tenha na sua OS, a mesma será invalidada.";

/// Whether a sector value routes to purchasing and therefore needs a cost center
pub fn sector_requires_cost_center(sector: &str) -> bool {
    let upper = sector.to_uppercase();
    upper.contains("COMPRAS") || upper.contains("COMPRA")
}

/// Render instruction produced when the sector value changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorUpdate {
    /// Mark the cost center required and show the purchasing banner
    ShowPurchasingWarning,
    /// Clear the required mark and remove the banner
    HidePurchasingWarning,
}

impl SectorUpdate {
    pub fn cost_center_required(self) -> bool {
        matches!(self, SectorUpdate::ShowPurchasingWarning)
    }

    pub fn banner(self) -> Option<&'static str> {
        match self {
            SectorUpdate::ShowPurchasingWarning => Some(PURCHASING_WARNING),
            SectorUpdate::HidePurchasingWarning => None,
        }
    }
}

/// Outcome of a submit attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitDecision {
    Proceed,
    Abort { invalid_fields: Vec<String> },
}

impl SubmitDecision {
    pub fn is_proceed(&self) -> bool {
        matches!(self, SubmitDecision::Proceed)
    }
}

/// The inputs of one form, looked up by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    fields: Vec<FieldState>,
    files: Vec<FileField>,
    purchasing_warning: bool,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a form from name/value pairs, keeping their order
    pub fn from_values<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut form = Self::new();
        for (name, value) in values {
            form.set_value(name, value);
        }
        form
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.set_value(name, value);
        self
    }

    pub fn with_file(mut self, file: FileField) -> Self {
        self.files.push(file);
        self
    }

    /// Set a field's value, adding the field if the form does not have it yet
    pub fn set_value(&mut self, name: &str, value: &str) {
        match self.field_mut(name) {
            Some(field) => field.set_value(value),
            None => self.fields.push(FieldState::new(name, value)),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldState> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut FieldState> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.value.as_str())
    }

    pub fn fields(&self) -> &[FieldState] {
        &self.fields
    }

    pub fn files(&self) -> &[FileField] {
        &self.files
    }

    pub fn file(&self, name: &str) -> Option<&FileField> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn purchasing_warning_visible(&self) -> bool {
        self.purchasing_warning
    }

    pub(crate) fn fields_mut(&mut self) -> &mut [FieldState] {
        &mut self.fields
    }

    pub(crate) fn files_mut(&mut self) -> &mut [FileField] {
        &mut self.files
    }

    pub(crate) fn ensure_field(&mut self, name: &str) -> &mut FieldState {
        let index = match self.fields.iter().position(|f| f.name == name) {
            Some(index) => index,
            None => {
                self.fields.push(FieldState::new(name, ""));
                self.fields.len() - 1
            }
        };
        &mut self.fields[index]
    }

    /// Apply a sector render instruction to the form state
    pub(crate) fn apply(&mut self, update: SectorUpdate) {
        self.purchasing_warning = update.banner().is_some();
        if let Some(cost_center) = self.field_mut(COST_CENTER_FIELD) {
            cost_center.required = update.cost_center_required();
        }
    }

    /// Names of fields currently carrying errors
    pub fn invalid_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| !f.errors().is_empty())
            .map(|f| f.name.clone())
            .chain(
                self.files
                    .iter()
                    .filter(|f| !f.errors().is_empty())
                    .map(|f| f.name.clone()),
            )
            .collect()
    }
}
