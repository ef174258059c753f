//! Traversal over every entity of a trip that can carry cost tracking links.
//!
//! Route trees come from user data and can be arbitrarily deep, so every walk
//! here uses an explicit stack. Items are visited in document order:
//! locations, routes (pre-order through `sub_routes`), then accommodations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::trip::{CostTrackingLink, Route, TripRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkedItemKind {
    Location,
    Route,
    Accommodation,
}

impl LinkedItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkedItemKind::Location => "location",
            LinkedItemKind::Route => "route",
            LinkedItemKind::Accommodation => "accommodation",
        }
    }
}

impl fmt::Display for LinkedItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Borrowed view of one link-carrying entity.
#[derive(Debug, Clone, Copy)]
pub struct LinkedItem<'a> {
    pub kind: LinkedItemKind,
    pub id: &'a str,
    pub links: &'a [CostTrackingLink],
}

impl TripRecord {
    /// Collects every link-carrying entity of the trip.
    pub fn linked_items(&self) -> Vec<LinkedItem<'_>> {
        let mut items = Vec::new();
        for location in self.locations() {
            items.push(LinkedItem {
                kind: LinkedItemKind::Location,
                id: &location.id,
                links: &location.cost_tracking_links,
            });
        }

        let mut stack: Vec<&Route> = self.routes().iter().rev().collect();
        while let Some(route) = stack.pop() {
            items.push(LinkedItem {
                kind: LinkedItemKind::Route,
                id: &route.id,
                links: &route.cost_tracking_links,
            });
            stack.extend(route.sub_routes.iter().rev());
        }

        for accommodation in self.accommodation_list() {
            items.push(LinkedItem {
                kind: LinkedItemKind::Accommodation,
                id: &accommodation.id,
                links: &accommodation.cost_tracking_links,
            });
        }
        items
    }

    /// Calls `visit` with the link list of every link-carrying entity.
    pub fn for_each_linked_item_mut<F>(&mut self, mut visit: F)
    where
        F: FnMut(LinkedItemKind, &str, &mut Vec<CostTrackingLink>),
    {
        if let Some(travel) = self.travel_data.as_mut() {
            for location in travel.locations.iter_mut() {
                visit(
                    LinkedItemKind::Location,
                    &location.id,
                    &mut location.cost_tracking_links,
                );
            }

            let mut stack: Vec<&mut Route> = travel.routes.iter_mut().rev().collect();
            while let Some(route) = stack.pop() {
                visit(
                    LinkedItemKind::Route,
                    &route.id,
                    &mut route.cost_tracking_links,
                );
                stack.extend(route.sub_routes.iter_mut().rev());
            }
        }

        if let Some(accommodations) = self.accommodations.as_mut() {
            for accommodation in accommodations.iter_mut() {
                visit(
                    LinkedItemKind::Accommodation,
                    &accommodation.id,
                    &mut accommodation.cost_tracking_links,
                );
            }
        }
    }

    /// Empties every link list in the trip. Returns how many links were dropped.
    pub fn clear_cost_tracking_links(&mut self) -> usize {
        let mut cleared = 0;
        self.for_each_linked_item_mut(|_, _, links| {
            cleared += links.len();
            links.clear();
        });
        cleared
    }

    pub fn link_count(&self) -> usize {
        self.linked_items().iter().map(|item| item.links.len()).sum()
    }
}
