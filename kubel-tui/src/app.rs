use std::path::PathBuf;
use std::sync::Arc;

use kubel_core::{
    correction::{CorrectedFields, CorrectionQueue},
    model::{ImportSummary, InvalidRow, InvalidRowId, QueuedRow},
    service::ImportService,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    Summary,
    InvalidRows,
    EditRow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FormField {
    Street,
    Number,
    City,
    PostalCode,
    Notes,
}

impl FormField {
    pub(crate) const ALL: [FormField; 5] = [
        FormField::Street,
        FormField::Number,
        FormField::City,
        FormField::PostalCode,
        FormField::Notes,
    ];

    pub(crate) fn label(self) -> &'static str {
        match self {
            FormField::Street => "Street",
            FormField::Number => "Number",
            FormField::City => "City",
            FormField::PostalCode => "Postal code",
            FormField::Notes => "Notes",
        }
    }
}

/// Operator input for one invalid row.
#[derive(Debug, Clone, Default)]
pub(crate) struct EditForm {
    pub street: String,
    pub number: String,
    pub city: String,
    pub postal_code: String,
    pub notes: String,
    pub focus: usize,
}

impl EditForm {
    pub(crate) fn for_row(row: &InvalidRow) -> Self {
        let prefill = CorrectedFields::from_row(row);
        Self {
            street: prefill.street,
            number: prefill.number,
            city: prefill.city,
            postal_code: prefill.postal_code.unwrap_or_default(),
            notes: row.notes.clone(),
            focus: 0,
        }
    }

    pub(crate) fn focused(&self) -> FormField {
        FormField::ALL
            .get(self.focus)
            .copied()
            .unwrap_or(FormField::Street)
    }

    pub(crate) fn value(&self, field: FormField) -> &str {
        match field {
            FormField::Street => &self.street,
            FormField::Number => &self.number,
            FormField::City => &self.city,
            FormField::PostalCode => &self.postal_code,
            FormField::Notes => &self.notes,
        }
    }

    pub(crate) fn focused_value_mut(&mut self) -> &mut String {
        match self.focused() {
            FormField::Street => &mut self.street,
            FormField::Number => &mut self.number,
            FormField::City => &mut self.city,
            FormField::PostalCode => &mut self.postal_code,
            FormField::Notes => &mut self.notes,
        }
    }

    pub(crate) fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % FormField::ALL.len();
    }

    pub(crate) fn focus_previous(&mut self) {
        self.focus = self
            .focus
            .checked_sub(1)
            .unwrap_or(FormField::ALL.len() - 1);
    }

    pub(crate) fn to_corrected(&self) -> CorrectedFields {
        CorrectedFields {
            street: self.street.clone(),
            number: self.number.clone(),
            city: self.city.clone(),
            postal_code: Some(self.postal_code.clone()),
            notes: Some(self.notes.clone()),
        }
    }
}

pub(crate) struct App {
    pub service: Arc<ImportService>,
    pub commercial_path: Option<PathBuf>,
    pub residential_path: Option<PathBuf>,
    pub store_label: String,

    pub screen: Screen,
    pub summary: Option<ImportSummary>,
    pub duplicate_list_index: usize,

    pub queue: CorrectionQueue,
    pub queued_rows: Vec<QueuedRow>,
    pub row_list_index: usize,

    pub editing: Option<InvalidRowId>,
    pub form: EditForm,

    pub is_loading: bool,
    pub error_message: Option<String>,
    pub info_message: Option<String>,
}

impl App {
    pub(crate) fn new(
        service: Arc<ImportService>,
        commercial_path: Option<PathBuf>,
        residential_path: Option<PathBuf>,
    ) -> Self {
        Self {
            service,
            commercial_path,
            residential_path,
            store_label: String::new(),
            screen: Screen::Summary,
            summary: None,
            duplicate_list_index: 0,
            queue: CorrectionQueue::default(),
            queued_rows: Vec::new(),
            row_list_index: 0,
            editing: None,
            form: EditForm::default(),
            is_loading: false,
            error_message: None,
            info_message: None,
        }
    }

    pub(crate) fn set_queue(&mut self, queue: CorrectionQueue) {
        self.queue = queue;
        self.refresh_rows();
    }

    pub(crate) fn refresh_rows(&mut self) {
        self.queued_rows = self.queue.snapshot();
        if self.row_list_index >= self.queued_rows.len() {
            self.row_list_index = self.queued_rows.len().saturating_sub(1);
        }
    }

    pub(crate) fn open_current_row(&mut self) {
        let Some(queued) = self.queued_rows.get(self.row_list_index) else {
            return;
        };
        self.form = EditForm::for_row(&queued.row);
        self.editing = Some(queued.id);
        self.screen = Screen::EditRow;
    }

    pub(crate) fn editing_row(&self) -> Option<&InvalidRow> {
        self.editing.and_then(|id| self.queue.get(id))
    }
}
