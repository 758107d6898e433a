impl Session {
    fn set_phase(&mut self, next: Phase) {
        if self.phase != next {
            self.events.emit(SessionEvent::PhaseChanged {
                from: self.phase,
                to: next,
            });
            info!(from = ?self.phase, to = ?next, "phase changed");
        }
        self.phase = next;
    }

    /// Derives the starting phase from the restored scene: all magnets and
    /// concepts back means concept distribution with playing unlocked, all
    /// magnets only means concept distribution, anything less restarts magnet
    /// distribution. A completely empty scene is a new game and places the
    /// table.
    fn prepare_phase(&mut self, store: &mut dyn AnchorStore, gateway: &mut dyn PersistenceGateway) {
        self.available_phases.clear();
        self.available_phases.insert(Phase::MagnetDistribution);

        let total = self.registry.concepts_count();
        let num_magnets = self.registry.magnets_in_scene_count();
        let num_concepts = self.registry.concepts_in_scene().len();
        debug!(num_magnets, num_concepts, total, "preparing phase");

        self.left_magnets_to_spawn = total.saturating_sub(num_magnets);
        self.left_concepts_to_spawn = total.saturating_sub(num_concepts);

        if num_magnets == total && num_concepts == total {
            self.available_phases.insert(Phase::ConceptDistribution);
            self.available_phases.insert(Phase::PlayingMain);
            self.set_phase(Phase::ConceptDistribution);
        } else if num_magnets == total {
            self.available_phases.insert(Phase::ConceptDistribution);
            self.set_phase(Phase::ConceptDistribution);
        } else {
            self.set_phase(Phase::MagnetDistribution);
        }

        if num_magnets != 0 || num_concepts != 0 {
            self.restore_magnet_data();
        } else {
            debug!("new game started");
            if self.registry.table().is_some() {
                self.binder.erase_and_destroy_objects(
                    &[BoundObject::Table],
                    &mut self.registry,
                    store,
                    gateway,
                );
            }
            let placement = find_table_placement(
                &mut self.rng,
                &self.user,
                &self.room,
                self.registry.table_size(),
            );
            self.registry.place_table(placement.position);
            self.binder
                .attach_anchor(BoundObject::Table, &self.registry, store);
            debug!("table placed for a new configuration");
        }
    }

    /// Rebuilds the slot arena from what is materialized in the scene:
    /// counts, exclusion-zone flags and nearest-concept reassociation.
    fn restore_magnet_data(&mut self) {
        let magnets = self.registry.magnet_ids();
        let concepts: Vec<ConceptId> = self.registry.concepts_in_scene().to_vec();
        let total = self.registry.concepts_count();

        self.left_magnets_to_spawn = total.saturating_sub(magnets.len());
        self.left_concepts_to_spawn = total.saturating_sub(concepts.len());

        self.slots.clear();
        for magnet in &magnets {
            self.slots.insert(*magnet, MagnetSlot::default());
        }

        if concepts.is_empty() && !magnets.is_empty() {
            debug!("restoring magnet data without concepts");
            let top = self.table_top();
            for magnet in magnets {
                let position = self.registry.magnet(magnet).map(|m| m.position);
                let outside = match (position, top) {
                    (Some(position), Some(top)) => positions_are_far(position, top),
                    _ => true,
                };
                if let Some(slot) = self.slots.get_mut(&magnet) {
                    slot.outside_exclusion_zone = outside;
                }
            }
        } else if !concepts.is_empty() && !magnets.is_empty() {
            debug!("restoring magnet data with concepts");
            for slot in self.slots.values_mut() {
                slot.outside_exclusion_zone = true;
            }
            self.reassociate_concepts(concepts);
        }
    }

    /// On resume, concepts claim their nearest magnet within the separation
    /// threshold; each concept binds at most once.
    fn reassociate_concepts(&mut self, concepts: Vec<ConceptId>) {
        let mut unclaimed = concepts;
        for magnet in self.registry.magnet_ids() {
            let Some(magnet_position) = self.registry.magnet(magnet).map(|m| m.position) else {
                continue;
            };
            let mut chosen: Option<(usize, f32)> = None;
            for (index, concept) in unclaimed.iter().enumerate() {
                let Some(concept_position) =
                    self.registry.concept(concept).map(|c| c.position)
                else {
                    continue;
                };
                let distance = magnet_position.distance(concept_position);
                if positions_are_far(magnet_position, concept_position) {
                    continue;
                }
                if chosen.map_or(true, |(_, best)| distance < best) {
                    chosen = Some((index, distance));
                }
            }
            if let Some((index, _)) = chosen {
                let concept = unclaimed.remove(index);
                debug!(magnet = magnet.0, concept = %concept, "concept reassociated");
                if let Some(slot) = self.slots.get_mut(&magnet) {
                    slot.associated_concept = Some(concept);
                }
            }
        }
    }

    /// The only phase-transition entry point. Every call tears down all
    /// running timers first so nothing stale fires into the new phase.
    pub fn change_phase(
        &mut self,
        next: Phase,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        self.events.emit(SessionEvent::RotatorHidden);
        self.timers.cancel_all();

        match next {
            Phase::MagnetDistribution => self.change_to_magnet_distribution(store, gateway),
            Phase::ConceptDistribution => self.change_to_concept_distribution(store, gateway),
            Phase::PlayingMain => self.change_to_playing_main(store, gateway),
            Phase::PlayingFinal => self.change_to_playing_final(store, gateway),
            Phase::Memorize => self.change_to_memorize(),
            Phase::Ended => warn!("ended is entered by gameplay, not by menu"),
        }
    }

    fn change_to_magnet_distribution(
        &mut self,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        self.open_dialog(
            "Magnet Distribution",
            "You are now in the magnet distribution phase, please pick up the magnet and \
             place it near a chosen loci. Consider to distribuite the magnets around your room.",
            DialogKind::Generic,
            true,
        );

        match self.phase {
            Phase::ConceptDistribution | Phase::Memorize => {
                let concepts: Vec<BoundObject> = self
                    .registry
                    .concepts_in_scene()
                    .iter()
                    .cloned()
                    .map(BoundObject::Concept)
                    .collect();
                self.binder.erase_and_destroy_objects(
                    &concepts,
                    &mut self.registry,
                    store,
                    gateway,
                );
                self.registry.reset_concepts_in_scene();

                self.set_phase(Phase::MagnetDistribution);
                self.restore_magnet_data();
                self.spawn_magnet_if_possible(store);

                self.available_phases.clear();
                self.available_phases.insert(Phase::MagnetDistribution);
                if self.all_magnets_outside_table_space() && self.left_magnets_to_spawn == 0 {
                    self.available_phases.insert(Phase::ConceptDistribution);
                }
                self.enable_magnets(true, true);
            }
            Phase::MagnetDistribution => {
                let magnets: Vec<BoundObject> = self
                    .registry
                    .magnet_ids()
                    .into_iter()
                    .map(BoundObject::Magnet)
                    .collect();
                self.binder.erase_and_destroy_objects(
                    &magnets,
                    &mut self.registry,
                    store,
                    gateway,
                );

                self.set_phase(Phase::MagnetDistribution);
                self.restore_magnet_data();
                self.spawn_magnet_if_possible(store);

                self.available_phases.clear();
                self.available_phases.insert(Phase::MagnetDistribution);
                self.enable_magnets(true, true);
            }
            Phase::PlayingMain | Phase::PlayingFinal | Phase::Ended => {
                self.begin_playing_reset(Phase::MagnetDistribution, store, gateway);
            }
        }
    }

    fn change_to_concept_distribution(
        &mut self,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        self.open_dialog(
            "Concept Distribution",
            "You are now in the concept distribution phase, please pick up the concept \
             and attach it to a magnet.",
            DialogKind::Generic,
            true,
        );

        match self.phase {
            Phase::MagnetDistribution | Phase::Memorize => {
                self.set_phase(Phase::ConceptDistribution);
                self.restore_magnet_data();
                self.spawn_concept_if_possible(store);

                self.available_phases.clear();
                self.available_phases.insert(Phase::MagnetDistribution);
                self.available_phases.insert(Phase::ConceptDistribution);
                if self.all_concepts_associated() && self.left_concepts_to_spawn == 0 {
                    self.available_phases.insert(Phase::PlayingMain);
                }

                self.enable_magnets(true, false);
                self.enable_concepts(true, true);
            }
            Phase::ConceptDistribution => {
                let concepts: Vec<BoundObject> = self
                    .registry
                    .concepts_in_scene()
                    .iter()
                    .cloned()
                    .map(BoundObject::Concept)
                    .collect();
                self.binder.erase_and_destroy_objects(
                    &concepts,
                    &mut self.registry,
                    store,
                    gateway,
                );
                self.registry.reset_concepts_in_scene();

                self.set_phase(Phase::ConceptDistribution);
                self.restore_magnet_data();
                self.spawn_concept_if_possible(store);

                self.available_phases.clear();
                self.available_phases.insert(Phase::MagnetDistribution);
                self.available_phases.insert(Phase::ConceptDistribution);

                self.enable_magnets(true, false);
                self.enable_concepts(true, true);
            }
            Phase::PlayingMain | Phase::PlayingFinal | Phase::Ended => {
                self.begin_playing_reset(Phase::ConceptDistribution, store, gateway);
            }
        }
    }

    fn change_to_playing_main(
        &mut self,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        match self.phase {
            Phase::PlayingMain | Phase::PlayingFinal | Phase::Ended => {
                // Restart: concepts snap back to their magnets and the game
                // state resets without touching persistence.
                let entries: Vec<(MagnetId, Option<ConceptId>)> = self
                    .slots
                    .iter()
                    .map(|(magnet, slot)| (*magnet, slot.associated_concept.clone()))
                    .collect();
                for (magnet, associated) in entries {
                    let position = self.registry.magnet(magnet).map(|m| m.position);
                    if let (Some(concept), Some(position)) = (associated.as_ref(), position) {
                        if let Some(entity) = self.registry.concept_mut(concept) {
                            entity.position = position;
                            entity.manipulable = false;
                        }
                    }
                    if let Some(slot) = self.slots.get_mut(&magnet) {
                        slot.free_time_seconds = 0.0;
                        slot.penalty_seconds = 0.0;
                        slot.is_being_held = false;
                        slot.attached_concept = slot.associated_concept.clone();
                    }
                }
                self.set_phase(Phase::PlayingMain);
                self.start_game(store, gateway);
            }
            _ => {
                self.set_phase(Phase::PlayingMain);

                // Objects move freely during play; runtime anchors go away
                // while the persisted records stay for the later reset.
                let mut objects: Vec<BoundObject> = Vec::new();
                for (magnet, slot) in &self.slots {
                    objects.push(BoundObject::Magnet(*magnet));
                    if let Some(concept) = &slot.associated_concept {
                        objects.push(BoundObject::Concept(concept.clone()));
                    }
                }
                objects.push(BoundObject::Table);
                self.binder
                    .release_runtime_anchors(&objects, &mut self.registry, store);

                for concept in self.registry.concepts_in_scene().to_vec() {
                    if let Some(entity) = self.registry.concept_mut(&concept) {
                        entity.manipulable = false;
                    }
                }
                self.start_game(store, gateway);
            }
        }
    }

    fn change_to_playing_final(
        &mut self,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        self.set_phase(Phase::PlayingFinal);

        for magnet in self.magnet_ids_snapshot() {
            let associated = self
                .slots
                .get(&magnet)
                .and_then(|slot| slot.associated_concept.clone());
            if let Some(slot) = self.slots.get_mut(&magnet) {
                slot.attached_concept = None;
            }
            if let Some(concept) = associated {
                self.move_to_random_floor(&concept, store, gateway);
                if let Some(entity) = self.registry.concept_mut(&concept) {
                    entity.manipulable = true;
                }
            }
            let position = self.registry.magnet(magnet).map(|m| m.position);
            self.emit_audio(AudioCue::MagnetDetach, position);
            if let Some(magnet) = self.registry.magnet_mut(magnet) {
                magnet.active = true;
            }
        }

        // Only the first magnet of the canonical order stays visible; each
        // correct placement reveals the next one.
        for magnet in self.sorted_magnets.iter().skip(1) {
            if let Some(magnet) = self.registry.magnet_mut(*magnet) {
                magnet.active = false;
            }
        }
    }

    fn change_to_memorize(&mut self) {
        self.open_dialog(
            "Memorize",
            "You are now in the memorize phase, please memorize the concepts and their positions.",
            DialogKind::Generic,
            true,
        );
        self.set_phase(Phase::Memorize);

        for magnet in self.registry.magnet_ids() {
            if let Some(magnet) = self.registry.magnet_mut(magnet) {
                magnet.active = false;
            }
        }
        for concept in self.registry.concepts_in_scene().to_vec() {
            if let Some(entity) = self.registry.concept_mut(&concept) {
                entity.manipulable = false;
            }
        }
    }

    /// Play-to-editing resets tear the scene down, reload the persisted
    /// anchors and park until the readiness predicate converges; the rest of
    /// the transition runs in `complete_playing_reset`.
    fn begin_playing_reset(
        &mut self,
        target: Phase,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        debug!(phase = ?target, "playing reset started");

        for slot in self.slots.values() {
            if let Some(concept) = &slot.associated_concept {
                self.registry.disable_concept(concept);
            }
        }
        self.registry.clear_magnets();
        self.registry.clear_table();

        if target == Phase::MagnetDistribution {
            // Only magnets survive a full reset; concept records go away.
            self.binder
                .erase_records_of_kind(ObjectKind::Concept, store, gateway);
        }
        self.registry.reset_concepts_in_scene();

        self.binder.request_load_all(store);
        self.pending_transition = Some(target);
    }

    fn complete_playing_reset(&mut self, target: Phase) {
        debug!(phase = ?target, "playing reset completed after readiness");
        match target {
            Phase::MagnetDistribution => {
                self.set_phase(Phase::MagnetDistribution);
                self.restore_magnet_data();

                self.available_phases.clear();
                self.available_phases.insert(Phase::MagnetDistribution);
                if self.all_magnets_outside_table_space() && self.left_magnets_to_spawn == 0 {
                    self.available_phases.insert(Phase::ConceptDistribution);
                }
                self.enable_magnets(true, true);
            }
            Phase::ConceptDistribution => {
                self.set_phase(Phase::ConceptDistribution);
                self.restore_magnet_data();

                self.available_phases.clear();
                self.available_phases.insert(Phase::MagnetDistribution);
                self.available_phases.insert(Phase::ConceptDistribution);
                if self.all_concepts_associated() && self.left_concepts_to_spawn == 0 {
                    self.available_phases.insert(Phase::PlayingMain);
                }

                self.enable_magnets(true, false);
                self.enable_concepts(true, true);
            }
            _ => warn!(phase = ?target, "unexpected playing reset target"),
        }
    }

    fn enable_magnets(&mut self, shown: bool, manipulable: bool) {
        for magnet in self.registry.magnet_ids() {
            if let Some(magnet) = self.registry.magnet_mut(magnet) {
                magnet.active = shown;
                magnet.manipulable = manipulable;
            }
        }
    }

    fn enable_concepts(&mut self, shown: bool, manipulable: bool) {
        for concept in self.registry.concepts_in_scene().to_vec() {
            if let Some(entity) = self.registry.concept_mut(&concept) {
                entity.visible = shown;
                entity.manipulable = manipulable;
            }
        }
    }
}
