//! Server-side state of a single dashboard session.
//!
//! [FitGuiSession] owns the current fit and is the only place it is replaced. Every form
//! notification goes through [FitGuiSession::handle_event]:
//!
//! 1. meta values are decoded, filled from defaults and compared with the last observed form;
//! 2. a meta change regenerates the whole fit with the fit factory;
//! 3. a prior change re-runs the solver with the prior decoded from the form;
//! 4. anything else is a no-op.
//!
//! A failed event leaves the current fit, the form snapshot and the layout untouched.

use crate::classify::{ChangeKind, FormSnapshot, classify};
use crate::codec::flat::{FlatForm, unflatten};
use crate::codec::meta::{self, MetaConfig, MetaValues};
use crate::config::GuiConfig;
use crate::error::{FitError, GuiError, SetupError, ValidationError};
use crate::event::FormEvent;
use crate::fit::result::FitResult;
use crate::layout::DashboardLayout;
use crate::plot::PlotRegistry;
use crate::recompute::{FitFactory, FitRecomputer, RecomputeCounts};
use crate::validation::{check_meta, check_no_correlation, check_prior};

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Additional check of meta values before the fit factory is called, `Err` holds a user message
pub type MetaValidator = dyn Fn(&MetaValues) -> Result<(), String> + Send + Sync;

/// Outcome of [FitGuiSession::handle_event]
#[derive(Clone, Debug)]
pub struct EventResponse {
    /// Classification of the event, `None` if it was rejected
    pub change: Option<ChangeKind>,
    /// Current fit after the event
    pub fit: Arc<FitResult>,
    /// Layout of the current fit
    pub layout: Arc<DashboardLayout>,
    pub error: Option<GuiError>,
}

impl EventResponse {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Fit state of a dashboard session
///
/// Clones share fits and layouts and evolve independently.
#[derive(Clone)]
pub struct FitGuiSession {
    config: GuiConfig,
    recomputer: FitRecomputer,
    factory: Option<Arc<dyn FitFactory>>,
    meta_config: Option<MetaConfig>,
    meta_defaults: MetaValues,
    meta_validator: Option<Arc<MetaValidator>>,
    plots: PlotRegistry,
    initial_fit: Arc<FitResult>,
    initial_snapshot: FormSnapshot,
    initial_layout: Arc<DashboardLayout>,
    // shape hint for prior edits: the initial fit or the latest regenerated one
    baseline: Arc<FitResult>,
    current: Arc<FitResult>,
    snapshot: FormSnapshot,
    layout: Arc<DashboardLayout>,
    last_error: Option<GuiError>,
}

impl FitGuiSession {
    /// Session for a ready fit without meta controls
    pub fn from_fit(fit: FitResult, config: GuiConfig) -> Result<Self, SetupError> {
        let recomputer = FitRecomputer::new(config.solver.clone());
        Self::setup(fit, None, None, MetaValues::new(), config, recomputer)
    }

    /// Session building its fits with `factory`
    ///
    /// `initial_meta` must hold a value for every declaration of `meta_config`, these values
    /// are also the defaults for blank meta fields.
    pub fn from_factory(
        factory: impl FitFactory + 'static,
        meta_config: MetaConfig,
        initial_meta: MetaValues,
        config: GuiConfig,
    ) -> Result<Self, SetupError> {
        Self::from_shared_factory(
            Arc::new(factory),
            meta_config,
            initial_meta,
            config.clone(),
            FitRecomputer::new(config.solver),
        )
    }

    /// Same as [FitGuiSession::from_factory] with a custom recomputer
    pub fn from_shared_factory(
        factory: Arc<dyn FitFactory>,
        meta_config: MetaConfig,
        initial_meta: MetaValues,
        config: GuiConfig,
        mut recomputer: FitRecomputer,
    ) -> Result<Self, SetupError> {
        let initial_meta = meta_config.normalize(&initial_meta);
        if let Some(name) = meta_config.names().find(|name| !initial_meta.contains_key(name)) {
            return Err(SetupError::MissingMetaDefault(name.to_owned()));
        }
        check_meta(&initial_meta, &meta_config)?;
        let fit = recomputer.regenerate_from_meta(factory.as_ref(), &initial_meta)?;
        Self::setup(
            fit,
            Some(factory),
            Some(meta_config),
            initial_meta,
            config,
            recomputer,
        )
    }

    fn setup(
        fit: FitResult,
        factory: Option<Arc<dyn FitFactory>>,
        meta_config: Option<MetaConfig>,
        meta_defaults: MetaValues,
        config: GuiConfig,
        recomputer: FitRecomputer,
    ) -> Result<Self, SetupError> {
        check_no_correlation(fit.prior())?;
        let plots = PlotRegistry::from_config(&config);
        let fit = Arc::new(fit);
        let snapshot = FormSnapshot::from_prior(fit.prior(), meta_defaults.clone());
        let layout = Arc::new(DashboardLayout::from_fit(
            &fit,
            &config,
            meta_config.as_ref(),
            snapshot.meta(),
            &plots,
        ));
        info!(
            model = fit.model().name(),
            n_parameters = fit.prior().n_estimates(),
            n_meta = meta_defaults.len(),
            "session created"
        );
        Ok(Self {
            config,
            recomputer,
            factory,
            meta_config,
            meta_defaults,
            meta_validator: None,
            plots,
            initial_fit: fit.clone(),
            initial_snapshot: snapshot.clone(),
            initial_layout: layout.clone(),
            baseline: fit.clone(),
            current: fit,
            snapshot,
            layout,
            last_error: None,
        })
    }

    /// Replace the recomputer, e.g. to use a custom solver
    pub fn with_recomputer(mut self, recomputer: FitRecomputer) -> Self {
        self.recomputer = recomputer;
        self
    }

    /// Reject meta values before the fit factory sees them
    pub fn with_meta_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&MetaValues) -> Result<(), String> + Send + Sync + 'static,
    {
        self.meta_validator = Some(Arc::new(validator));
        self
    }

    /// Replace the figures and re-render the layout of the current and the initial fit
    pub fn with_plots(mut self, plots: PlotRegistry) -> Self {
        self.plots = plots;
        self.initial_layout = Arc::new(self.build_layout(&self.initial_fit, self.initial_snapshot.meta()));
        self.layout = Arc::new(self.build_layout(&self.current, self.snapshot.meta()));
        self
    }

    /// Process a form notification, errors are reported in the response and never returned
    pub fn handle_event(&mut self, event: &FormEvent) -> EventResponse {
        let result = self.try_handle_event(event);
        EventResponse {
            change: result.as_ref().ok().copied(),
            fit: self.current_fit(),
            layout: self.layout(),
            error: result.err(),
        }
    }

    /// Same as [FitGuiSession::handle_event] returning the error
    pub fn try_handle_event(&mut self, event: &FormEvent) -> Result<ChangeKind, GuiError> {
        let result = self.process(event);
        match &result {
            Ok(change) => {
                debug!(%change, "event handled");
                self.last_error = None;
            }
            Err(error) => {
                warn!(%error, "event rejected");
                self.last_error = Some(error.clone());
            }
        }
        result
    }

    fn process(&mut self, event: &FormEvent) -> Result<ChangeKind, GuiError> {
        let decoded = meta::decode(&event.meta_values, self.meta_config.as_ref())?;
        let meta = meta::merge_with_defaults(&decoded, &self.meta_defaults);
        let prior = FlatForm::from_fields(&event.parameter_ids, &event.parameter_values);
        let change = match &prior {
            Ok(prior) => classify(&self.snapshot, &meta, prior),
            // prior fields are stale when meta changed
            Err(_) if self.snapshot.meta_differs(&meta) => ChangeKind::MetaChanged,
            Err(_) => ChangeKind::PriorChanged,
        };
        debug!(%change, "event classified");
        match change {
            ChangeKind::MetaChanged => self.regenerate(meta)?,
            ChangeKind::PriorChanged => self.refit(prior?)?,
            ChangeKind::NoOp => {}
        }
        Ok(change)
    }

    fn regenerate(&mut self, meta: MetaValues) -> Result<(), GuiError> {
        if let Some(meta_config) = &self.meta_config {
            check_meta(&meta, meta_config)?;
        }
        if let Some(validator) = &self.meta_validator {
            validator(&meta).map_err(ValidationError::MetaRejected)?;
        }
        let factory = self.factory.as_ref().ok_or_else(|| {
            FitError::FitConstructionFailure("session has no fit factory".to_owned())
        })?;
        let fit = self.recomputer.regenerate_from_meta(factory.as_ref(), &meta)?;
        check_no_correlation(fit.prior())?;
        info!(
            n_parameters = fit.prior().n_estimates(),
            "fit regenerated from meta values"
        );
        let fit = Arc::new(fit);
        let snapshot = FormSnapshot::from_prior(fit.prior(), meta);
        self.replace(fit.clone(), snapshot);
        self.baseline = fit;
        Ok(())
    }

    fn refit(&mut self, prior: FlatForm) -> Result<(), GuiError> {
        check_prior(&prior)?;
        let new_prior = unflatten(&prior, self.baseline.prior())?;
        let fit = self.recomputer.refit_with_prior(&self.current, new_prior)?;
        info!(
            chi2_dof = fit.metrics().map(|m| m.chi2_dof()),
            "fit recomputed with new prior"
        );
        let snapshot = self.snapshot.clone().with_prior(prior);
        self.replace(Arc::new(fit), snapshot);
        Ok(())
    }

    fn replace(&mut self, fit: Arc<FitResult>, snapshot: FormSnapshot) {
        self.layout = Arc::new(self.build_layout(&fit, snapshot.meta()));
        self.current = fit;
        self.snapshot = snapshot;
    }

    fn build_layout(&self, fit: &FitResult, meta: &MetaValues) -> DashboardLayout {
        DashboardLayout::from_fit(fit, &self.config, self.meta_config.as_ref(), meta, &self.plots)
    }

    /// Restore the initial fit and the form it was shown with
    pub fn reset(&mut self) {
        info!("session reset to the initial fit");
        self.current = self.initial_fit.clone();
        self.baseline = self.initial_fit.clone();
        self.snapshot = self.initial_snapshot.clone();
        self.layout = self.initial_layout.clone();
        self.last_error = None;
    }

    pub fn current_fit(&self) -> Arc<FitResult> {
        self.current.clone()
    }

    pub fn initial_fit(&self) -> Arc<FitResult> {
        self.initial_fit.clone()
    }

    pub fn layout(&self) -> Arc<DashboardLayout> {
        self.layout.clone()
    }

    pub fn last_error(&self) -> Option<&GuiError> {
        self.last_error.as_ref()
    }

    /// Meta values the current fit was built from
    pub fn meta_values(&self) -> &MetaValues {
        self.snapshot.meta()
    }

    pub fn meta_config(&self) -> Option<&MetaConfig> {
        self.meta_config.as_ref()
    }

    pub fn snapshot(&self) -> &FormSnapshot {
        &self.snapshot
    }

    pub fn config(&self) -> &GuiConfig {
        &self.config
    }

    pub fn counts(&self) -> RecomputeCounts {
        self.recomputer.counts()
    }
}

impl fmt::Debug for FitGuiSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FitGuiSession")
            .field("config", &self.config)
            .field("recomputer", &self.recomputer)
            .field("meta_config", &self.meta_config)
            .field("current", &self.current)
            .field("snapshot", &self.snapshot)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::flat::flatten;
    use crate::codec::meta::{MetaDeclaration, MetaValue};
    use crate::error::DecodeError;
    use crate::estimate::ScalarEstimate;
    use crate::event::FieldId;
    use crate::fit::data::FitData;
    use crate::fit::model::FitModel;
    use crate::fit::solver::LmCurveFit;
    use crate::parameters::ParameterSet;
    use crate::recompute::BoxError;

    fn line_fit(prior: ParameterSet) -> FitResult {
        let x = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let y: Vec<_> = x
            .iter()
            .map(|&x| ScalarEstimate::new(0.7 * x, 0.3))
            .collect();
        let model = FitModel::new("slope", |x, p| {
            let slope = p.scalar("slope").unwrap();
            x.map(|x| slope * x)
        });
        FitResult::fit(FitData::new(x, y).unwrap(), model, prior, &LmCurveFit::default()).unwrap()
    }

    fn session() -> FitGuiSession {
        let prior = ParameterSet::new().with_scalar("slope", 0.5, 0.4);
        FitGuiSession::from_fit(line_fit(prior), GuiConfig::default()).unwrap()
    }

    fn echo(session: &FitGuiSession) -> FormEvent {
        FormEvent::from_entries(&flatten(session.current_fit().prior()), vec![])
    }

    #[test]
    fn echo_is_noop() {
        let mut session = session();
        let before = session.current_fit();
        let response = session.handle_event(&echo(&session));
        assert_eq!(response.change, Some(ChangeKind::NoOp));
        assert!(Arc::ptr_eq(&before, &response.fit));
        assert_eq!(session.counts(), RecomputeCounts::default());
    }

    #[test]
    fn prior_edit_refits() {
        let mut session = session();
        let mut event = echo(&session);
        event.set_parameter("slope-sdev", 2.0);
        let response = session.handle_event(&event);
        assert_eq!(response.change, Some(ChangeKind::PriorChanged));
        assert_eq!(session.counts().refits, 1);
        assert_eq!(
            response.fit.prior().get("slope").unwrap().estimates()[0],
            ScalarEstimate::new(0.5, 2.0)
        );
        assert!(!Arc::ptr_eq(&session.initial_fit(), &response.fit));
        // the same event again is an echo now
        let again = session.handle_event(&event);
        assert_eq!(again.change, Some(ChangeKind::NoOp));
        assert_eq!(session.counts().refits, 1);
    }

    #[test]
    fn rejected_event_keeps_state() {
        let mut session = session();
        let before = session.current_fit();
        let event = FormEvent::new(
            vec![FieldId::prior("slope-mean"), FieldId::prior("slope-sdev")],
            vec![MetaValue::Number(1.0), MetaValue::Number(-1.0)],
            vec![],
        );
        let response = session.handle_event(&event);
        assert_eq!(response.change, None);
        assert!(matches!(
            response.error,
            Some(GuiError::Validation(ValidationError::NonPositiveUncertainty { .. }))
        ));
        assert!(Arc::ptr_eq(&before, &session.current_fit()));
        assert_eq!(session.last_error(), response.error.as_ref());
        assert_eq!(session.counts().refits, 0);

        // a valid echo afterwards clears the error
        session.handle_event(&echo(&session));
        assert!(session.last_error().is_none());
    }

    #[test]
    fn unreadable_field_is_decode_error() {
        let mut session = session();
        let event = FormEvent::new(
            vec![FieldId::prior("slope-mean"), FieldId::prior("slope-sdev")],
            vec![MetaValue::from("half"), MetaValue::Number(0.4)],
            vec![],
        );
        assert!(matches!(
            session.try_handle_event(&event),
            Err(GuiError::Decode(DecodeError::InvalidNumber { .. }))
        ));
    }

    #[test]
    fn meta_without_config_is_rejected() {
        let mut session = session();
        let mut event = echo(&session);
        event.meta_values = vec![MetaValue::Number(3.0)];
        assert_eq!(
            session.try_handle_event(&event),
            Err(GuiError::ConfigMismatch(
                crate::error::ConfigMismatchError::ValuesWithoutConfig(1)
            ))
        );
    }

    fn factory(meta: &MetaValues) -> Result<FitResult, BoxError> {
        let sdev = meta.number("sdev").ok_or("sdev is missing")?;
        if sdev > 100.0 {
            return Err("sdev is too large".into());
        }
        Ok(line_fit(ParameterSet::new().with_scalar("slope", 0.0, sdev)))
    }

    fn factory_session() -> FitGuiSession {
        let config: MetaConfig = [MetaDeclaration::number("sdev", Some(0.01), None, None)]
            .into_iter()
            .collect();
        FitGuiSession::from_factory(
            factory,
            config,
            MetaValues::new().with("sdev", 1.0),
            GuiConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn meta_change_regenerates() {
        let mut session = factory_session();
        assert_eq!(session.counts().regenerations, 1);
        let mut event = session.layout().echo_event();
        event.meta_values = vec![MetaValue::from("5")];
        event.set_parameter("slope-sdev", 0.1);
        let response = session.handle_event(&event);
        assert_eq!(response.change, Some(ChangeKind::MetaChanged));
        assert_eq!(session.counts(), RecomputeCounts { refits: 0, regenerations: 2 });
        assert_eq!(
            response.fit.prior().get("slope").unwrap().estimates()[0].sdev(),
            5.0
        );
        assert_eq!(session.meta_values().number("sdev"), Some(5.0));
        assert_eq!(response.fit.meta(), Some(session.meta_values()));
    }

    #[test]
    fn blank_meta_falls_back_to_default() {
        let mut session = factory_session();
        let mut event = session.layout().echo_event();
        event.meta_values = vec![MetaValue::from("")];
        let response = session.handle_event(&event);
        assert_eq!(response.change, Some(ChangeKind::NoOp));
    }

    #[test]
    fn factory_error_keeps_fit() {
        let mut session = factory_session();
        let before = session.current_fit();
        let mut event = session.layout().echo_event();
        event.meta_values = vec![MetaValue::Number(500.0)];
        let response = session.handle_event(&event);
        assert_eq!(
            response.error,
            Some(GuiError::Fit(FitError::FitConstructionFailure(
                "sdev is too large".into()
            )))
        );
        assert!(Arc::ptr_eq(&before, &response.fit));
        assert_eq!(session.meta_values().number("sdev"), Some(1.0));
    }

    #[test]
    fn meta_constraints_and_validator() {
        let mut session = factory_session().with_meta_validator(|meta| {
            match meta.number("sdev") {
                Some(x) if x == 13.0 => Err("unlucky".to_owned()),
                _ => Ok(()),
            }
        });
        let mut event = session.layout().echo_event();
        event.meta_values = vec![MetaValue::Number(0.0)];
        assert!(matches!(
            session.try_handle_event(&event),
            Err(GuiError::Validation(ValidationError::MetaOutOfRange { .. }))
        ));
        event.meta_values = vec![MetaValue::Number(13.0)];
        assert_eq!(
            session.try_handle_event(&event),
            Err(GuiError::Validation(ValidationError::MetaRejected("unlucky".into())))
        );
        assert_eq!(session.counts().regenerations, 1);
    }

    #[test]
    fn reset_restores_initial_fit() {
        let mut session = session();
        let mut event = echo(&session);
        event.set_parameter("slope-mean", 2.0);
        session.handle_event(&event);
        assert!(!Arc::ptr_eq(&session.initial_fit(), &session.current_fit()));
        session.reset();
        assert!(Arc::ptr_eq(&session.initial_fit(), &session.current_fit()));
        assert_eq!(session.handle_event(&echo(&session)).change, Some(ChangeKind::NoOp));
    }

    #[test]
    fn correlated_initial_prior_aborts_setup() {
        let prior = ParameterSet::new()
            .with_scalar("slope", 0.5, 0.4)
            .with_scalar("unused", 0.0, 1.0)
            .with_correlation(ndarray::array![[1.0, 0.5], [0.5, 1.0]]);
        let fit = line_fit(ParameterSet::new().with_scalar("slope", 0.5, 0.4));
        let fit = FitResult::new(
            fit.data().clone(),
            fit.model().clone(),
            prior.clone(),
            prior,
            None,
        );
        assert!(matches!(
            FitGuiSession::from_fit(fit, GuiConfig::default()),
            Err(SetupError::InvalidInitialFit(ValidationError::CorrelatedPriorUnsupported { .. }))
        ));
    }

    #[test]
    fn missing_meta_default_aborts_setup() {
        let config: MetaConfig = [MetaDeclaration::number("sdev", None, None, None)]
            .into_iter()
            .collect();
        assert_eq!(
            FitGuiSession::from_factory(factory, config, MetaValues::new(), GuiConfig::default())
                .unwrap_err(),
            SetupError::MissingMetaDefault("sdev".into())
        );
    }

    #[test]
    fn session_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<FitGuiSession>();
    }
}
