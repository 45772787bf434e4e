//! The warehouse: a fixed set of sectors working on orders in parallel.

use std::cell::RefCell;
use std::rc::Rc;

use depot_core::{Environment, SimError};
use tracing::debug;

use crate::dists::ServiceTimeDistribution;
use crate::sector::{Sector, SectorVisit};

/// A warehouse has a fixed number of sectors. An order is split into one share per
/// sector it needs; the shares are prepared concurrently and the order is ready once
/// the last one is done.
///
/// Cloning gives another handle to the same warehouse.
#[derive(Clone, Debug)]
pub struct Warehouse {
    env: Environment,
    sectors: Rc<[Rc<Sector>]>,
    visits: Rc<RefCell<Vec<SectorVisit>>>,
}

impl Warehouse {
    /// Build `num_sectors` sectors with `num_employees` employees each. `preparation_time`
    /// is called once per sector to build its service time distribution.
    pub fn new<F>(
        env: &Environment,
        num_sectors: usize,
        num_employees: usize,
        mut preparation_time: F,
    ) -> Result<Self, SimError>
    where
        F: FnMut(usize) -> Result<Box<dyn ServiceTimeDistribution>, SimError>,
    {
        let sectors = (0..num_sectors)
            .map(|id| -> Result<Rc<Sector>, SimError> {
                let distribution = preparation_time(id)?;
                Ok(Rc::new(Sector::new(env, id, num_employees, distribution)?))
            })
            .collect::<Result<Vec<_>, SimError>>()?;
        Ok(Self {
            env: env.clone(),
            sectors: sectors.into(),
            visits: Rc::default(),
        })
    }

    pub fn sectors(&self) -> &[Rc<Sector>] {
        &self.sectors
    }

    pub fn sector(&self, id: usize) -> Option<&Rc<Sector>> {
        self.sectors.get(id)
    }

    /// Every finished sector visit, in completion order.
    pub fn visits(&self) -> Vec<SectorVisit> {
        self.visits.borrow().clone()
    }

    /// Prepare `order` in every sector of `sector_ids` concurrently and wait for all of
    /// them. Visits are returned in the order of `sector_ids`.
    pub async fn handle_order(
        &self,
        order: &str,
        sector_ids: &[usize],
    ) -> Result<Vec<SectorVisit>, SimError> {
        let sectors = sector_ids
            .iter()
            .map(|&id| {
                self.sector(id).cloned().ok_or_else(|| {
                    SimError::Process(format!("{order} needs unknown sector {id}"))
                })
            })
            .collect::<Result<Vec<_>, SimError>>()?;

        let shares: Vec<_> = sectors
            .into_iter()
            .map(|sector| {
                let env = self.env.clone();
                let visits = Rc::clone(&self.visits);
                let order = order.to_string();
                self.env
                    .process(format!("{order} / {}", sector.name()), async move {
                        let visit = sector.process_order(&env, &order).await?;
                        visits.borrow_mut().push(visit.clone());
                        Ok(visit)
                    })
            })
            .collect();

        debug!(order, shares = shares.len(), "Order split across sectors");
        self.env.all_of(shares).await
    }
}
