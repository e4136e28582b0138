use crate::geometry::Vector;

/// A charge carrier sitting on one site.
#[derive(Debug, Clone, PartialEq)]
pub struct Carrier {
    /// The occupied site.
    pub site: usize,
    /// Displacement over all measured hops of all reruns.
    pub displacement: Vector,
    /// Displacement over the measured hops of the current rerun.
    pub rerun_displacement: Vector,
    /// Sum over finished reruns of the squared rerun displacement divided by the rerun's
    /// measured time, per axis.
    pub squared_displacement_rate: Vector,
    /// Measured hops.
    pub hops: u64,
    /// Measured hop attempts onto occupied sites.
    pub failed_hops: u64,
}

impl Carrier {
    /// A carrier without history on `site`.
    pub fn new(site: usize) -> Self {
        Self {
            site,
            displacement: Vector::zeros(),
            rerun_displacement: Vector::zeros(),
            squared_displacement_rate: Vector::zeros(),
            hops: 0,
            failed_hops: 0,
        }
    }

    /// Move to a new site for the next rerun, keeping accumulated statistics.
    pub fn relocate(&mut self, site: usize) {
        self.site = site;
        self.rerun_displacement = Vector::zeros();
    }

    /// Record a measured hop along `d`.
    pub fn record_hop(&mut self, d: &Vector) {
        self.displacement += d;
        self.rerun_displacement += d;
        self.hops += 1;
    }

    /// Fold the rerun displacement into the squared displacement rate.
    pub fn finish_rerun(&mut self, rerun_time: f64) {
        if rerun_time > 0.0 {
            self.squared_displacement_rate +=
                self.rerun_displacement.component_mul(&self.rerun_displacement) / rerun_time;
        }
        self.rerun_displacement = Vector::zeros();
    }
}
