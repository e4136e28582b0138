use super::Carrier;
use crate::graph::SiteGraph;
use crate::results::KmcObservables;

/// Transport coefficients after `reruns` finished measurements of total length `time`.
///
/// Mobility and current density use the net displacement along the field. The diffusivity is
/// taken perpendicular to the field, from squared displacements per unit time of every rerun,
/// averaged over carriers and reruns.
pub(crate) fn collect_observables(
    graph: &SiteGraph,
    carriers: &[Carrier],
    time: f64,
    reruns: usize,
    hops: u64,
    failed_hops: u64,
) -> KmcObservables {
    let n_carriers = carriers.len() as f64;
    let dz: f64 = carriers.iter().map(|c| c.displacement.z).sum();
    let perpendicular: f64 = carriers
        .iter()
        .map(|c| c.squared_displacement_rate.x + c.squared_displacement_rate.y)
        .sum();

    let mobility = dz / (n_carriers * graph.rate_model().field * time);
    let diffusivity = perpendicular / (4.0 * n_carriers * reruns.max(1) as f64);
    let occupation_energy: f64 = graph
        .sites()
        .iter()
        .map(|s| s.total_occupation_time * s.energy)
        .sum();
    let average_energy = carriers
        .iter()
        .map(|c| graph.site(c.site).energy)
        .sum::<f64>()
        / n_carriers;

    KmcObservables {
        mobility,
        diffusivity,
        einstein_ratio: mobility / diffusivity,
        current_density: dz / (time * graph.n_sites() as f64),
        equilibration_energy: occupation_energy / (n_carriers * time),
        average_energy,
        simulation_time: time,
        hops,
        failed_hops,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{PeriodicBox, RateModel, SitePoint, Vector};
    use crate::graph::GraphBuilder;
    use approx::assert_relative_eq;

    #[test]
    fn hand_computed_values() {
        let b = PeriodicBox::new([4.0, 4.0, 4.0]);
        let points = vec![
            SitePoint::new(0.0, 0.0, 0.0, -1.0),
            SitePoint::new(0.0, 0.0, 1.0, 0.5),
            SitePoint::new(0.0, 1.0, 0.0, 2.0),
            SitePoint::new(1.0, 0.0, 0.0, 0.0),
        ];
        let rates = RateModel {
            localization_length: 1.0,
            temperature: 1.0,
            field: 0.5,
        };
        let mut graph = GraphBuilder::new(b, 1.5, rates).build(points);
        graph.site_mut(0).total_occupation_time = 3.0;
        graph.site_mut(1).total_occupation_time = 1.0;

        let mut a = Carrier::new(0);
        a.displacement = Vector::new(1.0, 0.0, 3.0);
        a.squared_displacement_rate = Vector::new(2.0, 1.0, 9.0);
        let mut c = Carrier::new(1);
        c.displacement = Vector::new(0.0, 0.0, 1.0);
        c.squared_displacement_rate = Vector::new(1.0, 0.0, 1.0);

        let obs = collect_observables(&graph, &[a, c], 2.0, 2, 10, 4);
        assert_relative_eq!(obs.mobility, 4.0 / (2.0 * 0.5 * 2.0));
        assert_relative_eq!(obs.diffusivity, 4.0 / (4.0 * 2.0 * 2.0));
        assert_relative_eq!(obs.einstein_ratio, 2.0 / 0.25);
        assert_relative_eq!(obs.current_density, 4.0 / (2.0 * 4.0));
        assert_relative_eq!(obs.equilibration_energy, (-3.0 + 0.5) / (2.0 * 2.0));
        assert_relative_eq!(obs.average_energy, -0.25);
        assert_eq!(obs.hops, 10);
        assert_eq!(obs.failed_hops, 4);
    }
}
