use chrono::Duration;

use super::{DispatchConfig, Dispatcher};
use crate::collab::{ClientDirectory, EmailSender, LinkBuilder, NoLinks, PlaceholderRenderer, TemplateRenderer};
use crate::workflow::WorkflowStore;

/// Builder de `Dispatcher`. Store, mailer y directorio son obligatorios;
/// renderer y links tienen valores por defecto (`PlaceholderRenderer`,
/// `NoLinks`).
#[derive(Debug)]
pub struct DispatcherBuilder<S, M, D, R = PlaceholderRenderer, L = NoLinks> {
    pub(super) store: S,
    pub(super) mailer: M,
    pub(super) directory: D,
    pub(super) renderer: R,
    pub(super) links: L,
    pub(super) config: DispatchConfig,
}

impl<S, M, D, R, L> DispatcherBuilder<S, M, D, R, L>
    where S: WorkflowStore,
          M: EmailSender,
          D: ClientDirectory,
          R: TemplateRenderer,
          L: LinkBuilder
{
    pub fn renderer<R2: TemplateRenderer>(self, renderer: R2) -> DispatcherBuilder<S, M, D, R2, L> {
        DispatcherBuilder { store: self.store,
                            mailer: self.mailer,
                            directory: self.directory,
                            renderer,
                            links: self.links,
                            config: self.config }
    }

    pub fn links<L2: LinkBuilder>(self, links: L2) -> DispatcherBuilder<S, M, D, R, L2> {
        DispatcherBuilder { store: self.store,
                            mailer: self.mailer,
                            directory: self.directory,
                            renderer: self.renderer,
                            links,
                            config: self.config }
    }

    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn claim_timeout(mut self, claim_timeout: Duration) -> Self {
        self.config.claim_timeout = claim_timeout;
        self
    }

    pub fn build(self) -> Dispatcher<S, M, D, R, L> {
        Dispatcher::from_builder(self)
    }
}
