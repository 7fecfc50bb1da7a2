//! Troop, hero and spell deployment for one attack.
use log::info;

use crate::bot::Bot;
use crate::config::DelayRange;
use crate::constants::FIRST_HERO_SLOT;
use crate::device::{Artifacts, Device, TextReader};
use crate::geometry::Point;
use crate::interrupt::Step;

impl<D: Device, R: TextReader, A: Artifacts> Bot<D, R, A> {
    /// Drop the army: flank troop, held heavy troop, siege, heroes, then spells.
    ///
    /// Slots past the configured toolbar are skipped. Returns early with
    /// `Interrupted` at the first tap or wait after the user clicks.
    pub(crate) async fn deploy_troops(&mut self) -> Step {
        let layout = self.config.layout.clone();
        let human = self.config.timing.human.clone();
        let heroes = usize::from(self.config.heroes);
        info!("[{}] Deploying troops...", self.tag);

        if let Some(slot) = layout.slot(0) {
            self.tap(slot).await?;
            self.human(human.select).await?;
            let flank = self
                .jitter
                .pick(&[layout.deploy_primary, layout.deploy_secondary])
                .unwrap_or(layout.deploy_primary);
            self.drop_near(flank, layout.troop_radius).await?;
            self.human(human.first_troop).await?;
        }

        if let Some(slot) = layout.slot(1) {
            self.tap(slot).await?;
            self.human(human.select).await?;
            let at = self
                .jitter
                .point_in_circle(layout.deploy_primary, layout.troop_radius);
            self.hold(at, self.config.timing.hold).await?;
            self.human(human.heavy_troop).await?;
        }

        if let Some(slot) = layout.slot(2) {
            self.tap(slot).await?;
            self.human(human.select).await?;
            self.drop_near(layout.siege_drop, layout.troop_radius).await?;
            self.human(human.heavy_troop).await?;
        }

        if heroes > 0 {
            info!("[{}] Deploying {heroes} hero(es)...", self.tag);
            if let Some(slot) = layout.slot(FIRST_HERO_SLOT) {
                self.tap(slot).await?;
                self.human(human.select).await?;
                self.drop_near(layout.deploy_primary, layout.troop_radius)
                    .await?;
                self.pause(self.config.timing.hero_ability_wait).await?;
                // second tap on a deployed hero fires its ability
                self.tap(slot).await?;
                self.human(human.hero_ability).await?;
            }
            for index in 1..heroes {
                let Some(slot) = layout.slot(FIRST_HERO_SLOT + index) else {
                    break;
                };
                self.tap(slot).await?;
                self.human(human.select).await?;
                self.drop_near(layout.deploy_secondary, layout.troop_radius)
                    .await?;
                self.human(human.select).await?;
                self.drop_near(layout.deploy_secondary, layout.troop_radius)
                    .await?;
                self.human(human.extra_hero).await?;
            }
        }

        if let Some(slot) = layout.slot(FIRST_HERO_SLOT + heroes) {
            info!("[{}] Deploying spells...", self.tag);
            self.tap(slot).await?;
            self.human(human.select).await?;
            for &target in &layout.spell_drops {
                self.drop_near(target, layout.spell_radius).await?;
                self.human(human.spell).await?;
            }
        }

        info!("[{}] Troops deployed.", self.tag);
        Ok(())
    }

    async fn drop_near(&mut self, target: Point, radius: u32) -> Step {
        let at = self.jitter.point_in_circle(target, radius);
        self.tap(at).await
    }

    async fn human(&mut self, range: DelayRange) -> Step {
        let delay = self.jitter.delay(range);
        self.pause(delay).await
    }
}
