//! Training form: collects the user's choices and maps them to the backend
//! job request.

use std::collections::BTreeMap;

use records::{Model, Task, TrainArgs, TrainRequest};

pub const DEFAULT_LR: f64 = 0.03;
pub const DEFAULT_BATCH_SIZE: u32 = 64;
/// Batch size the backend assumes when continuing a model.
pub const FALLBACK_BATCH_SIZE: u32 = 32;
pub const DEFAULT_BUFFER_SIZE: u32 = 200;
pub const DEFAULT_EPOCHS: u32 = 200;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TrainFormError {
    #[error("extra parameter must be key=value, got {0:?}")]
    MalformedExtra(String),
    #[error("no trained model named {0:?}")]
    UnknownModel(String),
    #[error("a training task is already running")]
    TaskRunning,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrainMode {
    /// Train a fresh model with user-chosen hyperparameters.
    #[default]
    New,
    /// Keep training an existing model on another dataset.
    Continue,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hyperparams {
    pub lr: f64,
    pub batch_size: u32,
    pub buffer_size: u32,
    pub epochs: u32,
}

impl Default for Hyperparams {
    fn default() -> Self {
        Self { lr: DEFAULT_LR, batch_size: DEFAULT_BATCH_SIZE, buffer_size: DEFAULT_BUFFER_SIZE, epochs: DEFAULT_EPOCHS }
    }
}

impl Hyperparams {
    /// Values sent for a continue-mode request.
    #[must_use]
    pub fn fallback() -> Self {
        Self { batch_size: FALLBACK_BATCH_SIZE, ..Self::default() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrainForm {
    pub mode: TrainMode,
    pub model_name: String,
    /// Display label as picked in the form, e.g. `CIFAR-10`.
    pub dataset: String,
    pub hyper: Hyperparams,
    /// Extra backend arguments in entry order.
    pub extras: Vec<(String, String)>,
}

impl TrainForm {
    #[must_use]
    pub fn new_training(model_name: &str, dataset: &str) -> Self {
        Self {
            mode: TrainMode::New,
            model_name: model_name.to_owned(),
            dataset: dataset.to_owned(),
            hyper: Hyperparams::default(),
            extras: Vec::new(),
        }
    }

    #[must_use]
    pub fn continue_training(model_name: &str, dataset: &str) -> Self {
        Self { mode: TrainMode::Continue, hyper: Hyperparams::fallback(), ..Self::new_training(model_name, dataset) }
    }

    /// Parse and append a `key=value` extra.
    ///
    /// # Errors
    ///
    /// [`TrainFormError::MalformedExtra`] when `raw` has no `=`.
    pub fn push_extra(&mut self, raw: &str) -> Result<(), TrainFormError> {
        self.extras.push(parse_extra(raw)?);
        Ok(())
    }

    /// Refuse submission while a task runs, or when continuing a model that
    /// does not exist.
    ///
    /// # Errors
    ///
    /// [`TrainFormError::TaskRunning`] or [`TrainFormError::UnknownModel`].
    pub fn ensure_submittable(&self, models: &[Model], tasks: &[Task]) -> Result<(), TrainFormError> {
        if insights::has_running_task(tasks) {
            return Err(TrainFormError::TaskRunning);
        }
        if self.mode == TrainMode::Continue && !models.iter().any(|model| model.model_name == self.model_name) {
            return Err(TrainFormError::UnknownModel(self.model_name.clone()));
        }
        Ok(())
    }

    /// Wire request. Continue mode ignores the form's hyperparameters and
    /// extras and sends the backend fallbacks.
    #[must_use]
    pub fn into_request(self) -> TrainRequest {
        let (hyper, others) = match self.mode {
            TrainMode::New => {
                let others: BTreeMap<String, String> =
                    self.extras.into_iter().filter(|(key, _)| !key.is_empty()).collect();
                (self.hyper, others)
            }
            TrainMode::Continue => (Hyperparams::fallback(), BTreeMap::new()),
        };
        TrainRequest {
            model_name: self.model_name,
            args: TrainArgs {
                dataset: dataset_id(&self.dataset).to_owned(),
                lr: hyper.lr,
                batch_size: hyper.batch_size,
                buffer_size: hyper.buffer_size,
                epochs: hyper.epochs,
                others,
            },
        }
    }
}

/// Backend dataset identifier for a display label. Unknown labels pass
/// through unchanged.
#[must_use]
pub fn dataset_id(label: &str) -> &str {
    match label {
        "CIFAR-10" => "seq-cifar10",
        "CIFAR-100" => "seq-cifar100",
        "Tiny-imagenet" => "seq-tinyimg",
        other => other,
    }
}

/// Split `key=value` at the first `=`, trimming both sides.
///
/// # Errors
///
/// [`TrainFormError::MalformedExtra`] when there is no `=`.
pub fn parse_extra(raw: &str) -> Result<(String, String), TrainFormError> {
    let (key, value) = raw.split_once('=').ok_or_else(|| TrainFormError::MalformedExtra(raw.to_owned()))?;
    Ok((key.trim().to_owned(), value.trim().to_owned()))
}

#[cfg(test)]
#[path = "train_test.rs"]
mod tests;
