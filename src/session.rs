use crate::{
    error::{HeroshotError, HeroshotResult},
    export::ExportFormat,
    history::History,
    model::Composition,
    pipeline::{self, ExportOutput},
    render::Compositor,
    store::RecoveryStore,
    validate::{self, FixContext, FixReport, ValidationReport},
};

/// One editing session: the composition, its undo history, the recovery
/// snapshot store, and a validation report kept current across mutations.
///
/// Every successful mutation pushes a history snapshot, overwrites the
/// recovery snapshot, and re-evaluates the rule engine. A successful export
/// clears the recovery snapshot; a failed mutation or export leaves all of
/// it untouched.
pub struct EditSession {
    id: String,
    history: History,
    store: Box<dyn RecoveryStore>,
    validation: ValidationReport,
    export_in_flight: bool,
    fix_ctx: FixContext,
}

impl EditSession {
    pub fn new(
        id: impl Into<String>,
        initial: Composition,
        store: Box<dyn RecoveryStore>,
    ) -> HeroshotResult<Self> {
        initial.validate()?;
        let validation = validate::evaluate(&initial);
        Ok(Self {
            id: id.into(),
            history: History::new(initial),
            store,
            validation,
            export_in_flight: false,
            fix_ctx: FixContext::default(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn composition(&self) -> &Composition {
        self.history.current()
    }

    pub fn validation(&self) -> &ValidationReport {
        &self.validation
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history_depth(&self) -> usize {
        self.history.depth()
    }

    /// A snapshot left behind by an earlier session with this id, if any.
    /// Recovery is offered, never applied silently; call
    /// [`accept_recovery`](Self::accept_recovery) or
    /// [`discard_recovery`](Self::discard_recovery) with the user's answer.
    pub fn offered_recovery(&self) -> HeroshotResult<Option<Composition>> {
        let snapshot = self.store.load(&self.id)?;
        Ok(snapshot.filter(|s| s != self.composition()))
    }

    pub fn accept_recovery(&mut self) -> HeroshotResult<bool> {
        let Some(snapshot) = self.offered_recovery()? else {
            return Ok(false);
        };
        self.commit(snapshot)?;
        Ok(true)
    }

    pub fn discard_recovery(&mut self) -> HeroshotResult<()> {
        self.store.clear(&self.id)
    }

    /// Run one mutation against a working copy. Only a successful mutation
    /// is committed; on error the current composition is unchanged and
    /// nothing is pushed or persisted.
    pub fn mutate(
        &mut self,
        f: impl FnOnce(&mut Composition) -> HeroshotResult<()>,
    ) -> HeroshotResult<()> {
        self.ensure_not_exporting()?;
        let mut working = self.composition().clone();
        f(&mut working)?;
        self.commit(working)
    }

    pub fn undo(&mut self) -> HeroshotResult<bool> {
        self.ensure_not_exporting()?;
        if self.history.undo().is_none() {
            return Ok(false);
        }
        self.persist_and_revalidate()?;
        Ok(true)
    }

    pub fn redo(&mut self) -> HeroshotResult<bool> {
        self.ensure_not_exporting()?;
        if self.history.redo().is_none() {
            return Ok(false);
        }
        self.persist_and_revalidate()?;
        Ok(true)
    }

    /// Apply the auto-fix for one rule as an undoable mutation. A rule that
    /// already passes is a no-op and pushes nothing.
    pub fn apply_fix(&mut self, rule_id: &str) -> HeroshotResult<()> {
        self.ensure_not_exporting()?;
        let fixed = validate::apply_fix(self.composition(), rule_id, &self.fix_ctx)?;
        if &fixed != self.composition() {
            self.commit(fixed)?;
        }
        Ok(())
    }

    /// Apply every available auto-fix as one undoable step.
    pub fn apply_all_fixes(&mut self) -> HeroshotResult<FixReport> {
        self.ensure_not_exporting()?;
        let (fixed, report) = validate::apply_all_fixes(self.composition(), &self.fix_ctx);
        if &fixed != self.composition() {
            self.commit(fixed)?;
        } else {
            self.validation = report.report.clone();
        }
        Ok(report)
    }

    /// Export the current composition. Clears the recovery snapshot on
    /// success; a failure leaves composition, history, and snapshot as they
    /// were.
    pub fn export(
        &mut self,
        compositor: &mut Compositor,
        assets: &mut crate::assets::AssetCache,
        format: ExportFormat,
        quality: Option<u8>,
    ) -> HeroshotResult<ExportOutput> {
        self.begin_export()?;
        let result = pipeline::export(self.composition(), compositor, assets, format, quality);
        self.export_in_flight = false;
        let output = result?;
        self.store.clear(&self.id)?;
        Ok(output)
    }

    /// Mark an export as in flight for callers driving the pipeline stages
    /// themselves. Mutations and further exports are refused until
    /// [`complete_export`](Self::complete_export).
    pub fn begin_export(&mut self) -> HeroshotResult<()> {
        if self.export_in_flight {
            return Err(HeroshotError::constraint("an export is already in flight"));
        }
        self.export_in_flight = true;
        Ok(())
    }

    pub fn complete_export(&mut self, success: bool) -> HeroshotResult<()> {
        self.export_in_flight = false;
        if success {
            self.store.clear(&self.id)?;
        }
        Ok(())
    }

    fn ensure_not_exporting(&self) -> HeroshotResult<()> {
        if self.export_in_flight {
            return Err(HeroshotError::constraint(
                "composition is locked while an export is in flight",
            ));
        }
        Ok(())
    }

    fn commit(&mut self, next: Composition) -> HeroshotResult<()> {
        next.validate()?;
        self.history.push(next);
        self.persist_and_revalidate()
    }

    fn persist_and_revalidate(&mut self) -> HeroshotResult<()> {
        self.store.save(&self.id, self.history.current())?;
        self.validation = validate::evaluate(self.history.current());
        tracing::debug!(
            session = %self.id,
            depth = self.history.depth(),
            score = self.validation.score,
            "session state committed"
        );
        Ok(())
    }
}
