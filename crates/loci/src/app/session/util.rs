/// Sign-preserving logarithmic damping around a reference point, so the
/// game-time budget keeps growing with room and magnet scale but ever more
/// slowly.
fn damped_factor(input: f32, reference: f32, base: f32, sensitivity: f32) -> f32 {
    let difference = (input - reference) / GAME_TIME_SOFTNESS;
    base + difference.signum() * (1.0 + difference.abs()).ln() * sensitivity
}

fn game_time_distance_factor(positions: &[Vec3]) -> f32 {
    let mut sum = 0.0f32;
    let mut count = 0u32;
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            sum += positions[i].distance(positions[j]);
            count += 1;
        }
    }
    let mean = if count == 0 { 0.0 } else { sum / count as f32 };
    debug!(mean, "mean inter-magnet distance");
    damped_factor(
        mean,
        GAME_TIME_DISTANCE_REFERENCE,
        GAME_TIME_DISTANCE_BASE,
        GAME_TIME_DISTANCE_SENSITIVITY,
    )
}

fn game_time_magnet_count_factor(count: usize) -> f32 {
    damped_factor(
        count as f32,
        GAME_TIME_COUNT_REFERENCE,
        GAME_TIME_COUNT_BASE,
        GAME_TIME_COUNT_SENSITIVITY,
    )
}

/// Standings rendered into dialog pages: descending by score, six entries a
/// page, names truncated and columns aligned.
fn standings_pages(standings: &HashMap<String, i32>) -> Vec<String> {
    let mut entries: Vec<(&String, &i32)> = standings.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    let mut pages = Vec::new();
    for chunk in entries.chunks(STANDINGS_PAGE_SIZE) {
        let name_width = chunk
            .iter()
            .map(|(name, _)| name.len().min(STANDINGS_NAME_LIMIT))
            .max()
            .unwrap_or(0);
        let value_width = chunk
            .iter()
            .map(|(_, value)| value.to_string().len())
            .max()
            .unwrap_or(0);

        let mut page = String::new();
        for (name, value) in chunk {
            let shown: String = name.chars().take(STANDINGS_NAME_LIMIT).collect();
            page.push_str(&format!("{shown:<name_width$} {value:>value_width$}\n"));
        }
        pages.push(page);
    }
    pages
}

impl Session {
    fn magnet_ids_snapshot(&self) -> Vec<MagnetId> {
        self.slots.keys().copied().collect()
    }

    fn table_top(&self) -> Option<Vec3> {
        self.registry.table().map(|table| table.top())
    }

    fn table_position(&self) -> Option<Vec3> {
        self.registry.table().map(|table| table.position)
    }

    fn facing_user(&self) -> Quat {
        let forward = self.user.forward_flat();
        Quat::from_yaw(forward.x.atan2(forward.z))
    }

    fn all_magnets_outside_table_space(&self) -> bool {
        self.slots.values().all(|slot| slot.outside_exclusion_zone)
    }

    fn all_concepts_associated(&self) -> bool {
        self.slots
            .values()
            .all(|slot| slot.associated_concept.is_some())
    }

    fn all_magnets_occupied_correctly(&self) -> bool {
        self.slots
            .values()
            .all(|slot| slot.attached_concept == slot.associated_concept)
    }

    fn count_free_magnets(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| slot.associated_concept.is_none())
            .count()
    }

    fn count_free_during_playing(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| slot.attached_concept.is_none())
            .count()
    }

    fn magnet_of_concept(&self, concept: &ConceptId) -> Option<MagnetId> {
        self.slots
            .iter()
            .find(|(_, slot)| slot.associated_concept.as_ref() == Some(concept))
            .map(|(magnet, _)| *magnet)
    }

    fn position_near_any_magnet(&self, position: Vec3) -> bool {
        self.magnet_ids_snapshot().into_iter().any(|magnet| {
            self.registry
                .magnet(magnet)
                .is_some_and(|entity| !positions_are_far(position, entity.position))
        })
    }

    /// Nearest magnet within the separation threshold, distribution rules:
    /// every magnet is a candidate, occupied ones get their concept evicted.
    fn nearest_magnet_for_distribution(&self, concept: &ConceptId) -> Option<MagnetId> {
        let position = self.registry.concept(concept).map(|c| c.position)?;
        self.nearest_magnet_within_threshold(position, |_| true)
    }

    /// Nearest magnet within the separation threshold, play rules: only
    /// unoccupied magnets count.
    fn nearest_magnet_for_playing(&self, concept: &ConceptId) -> Option<MagnetId> {
        let position = self.registry.concept(concept).map(|c| c.position)?;
        self.nearest_magnet_within_threshold(position, |slot| slot.attached_concept.is_none())
    }

    fn nearest_magnet_within_threshold(
        &self,
        position: Vec3,
        accepts: impl Fn(&MagnetSlot) -> bool,
    ) -> Option<MagnetId> {
        let mut nearest: Option<(MagnetId, f32)> = None;
        for (magnet, slot) in &self.slots {
            if !accepts(slot) {
                continue;
            }
            let Some(magnet_position) = self.registry.magnet(*magnet).map(|m| m.position) else {
                continue;
            };
            if positions_are_far(position, magnet_position) {
                continue;
            }
            let distance = position.distance(magnet_position);
            if nearest.map_or(true, |(_, best)| distance < best) {
                nearest = Some((*magnet, distance));
            }
        }
        nearest.map(|(magnet, _)| magnet)
    }

    /// Magnets in the canonical order of their associated concepts' upload
    /// ids; used for sequential release and the final-phase reveal order.
    fn sort_magnets_by_upload_order(&self) -> Vec<MagnetId> {
        let mut remaining = self.magnet_ids_snapshot();
        let mut sorted = Vec::with_capacity(remaining.len());
        for id in self.registry.spawn_order() {
            let position = remaining.iter().position(|magnet| {
                self.slots
                    .get(magnet)
                    .and_then(|slot| slot.associated_concept.as_ref())
                    == Some(id)
            });
            if let Some(index) = position {
                sorted.push(remaining.remove(index));
            }
        }
        sorted
    }

    /// Keepout set for floor scattering: every magnet plus every concept
    /// bound to one.
    fn keepout_positions(&self) -> Vec<Vec3> {
        let mut keepout = Vec::new();
        for (magnet, slot) in &self.slots {
            if let Some(entity) = self.registry.magnet(*magnet) {
                keepout.push(entity.position);
            }
            if let Some(concept) = &slot.associated_concept {
                if let Some(entity) = self.registry.concept(concept) {
                    keepout.push(entity.position);
                }
            }
        }
        keepout
    }
}
