use netdiffuse::{generators, ContactModel, ContactSpreading, RandomSource};

#[test]
fn sir_on_preferential_attachment_graph() {
    let mut rng = RandomSource::seeded(12);
    let graph = generators::barabasi_albert(200, 5, &mut rng).unwrap();
    let process = ContactSpreading::new(ContactModel::Sir { beta: 0.2, gamma: 0.2 }, 0.08).unwrap();
    let outcome = process.run(&graph, &mut rng).unwrap();

    let log = outcome.log();
    let s = log.series("sir", "S").unwrap();
    let i = log.series("sir", "I").unwrap();
    let r = log.series("sir", "R").unwrap();
    assert_eq!(i[0], 16);
    for epoch in 0..s.len() {
        assert_eq!(s[epoch] + i[epoch] + r[epoch], 200);
    }
    // stops exactly when no one is infected, unless capped
    if outcome.epochs() < 1000 {
        assert_eq!(*i.last().unwrap(), 0);
    }
    assert_eq!(outcome.newly_infected().len(), outcome.epochs() + 1);

    let recovered: usize = outcome.newly_recovered().iter().map(Vec::len).sum();
    assert_eq!(recovered, *r.last().unwrap());
}

#[test]
fn si_stops_when_no_susceptible_is_exposed() {
    // two components; only the seeded side can be infected
    let graph = generators::from_edge_list(
        ["0", "1", "2", "3", "4", "5"],
        [("0", "1"), ("1", "2"), ("3", "4"), ("4", "5")],
    );
    let process = ContactSpreading::new(ContactModel::Si { beta: 1.0 }, 0.1).unwrap();
    let outcome = process.run(&graph, &mut RandomSource::seeded(3)).unwrap();

    let infected = *outcome.log().series("si", "I").unwrap().last().unwrap();
    assert_eq!(infected, 3);
    let states = outcome.log().final_states().unwrap();
    let seed = &outcome.newly_infected()[0][0];
    let side: &[&str] = if ["0", "1", "2"].contains(&seed.as_str()) {
        &["0", "1", "2"]
    } else {
        &["3", "4", "5"]
    };
    for node in side {
        assert_eq!(states.state_of("si", node), Some("I"));
    }
}

#[test]
fn contact_runs_are_reproducible() {
    let graph = generators::erdos_renyi(80, 0.08, &mut RandomSource::seeded(1)).unwrap();
    let process = ContactSpreading::new(ContactModel::Sir { beta: 0.3, gamma: 0.1 }, 0.05).unwrap();
    let a = process.run(&graph, &mut RandomSource::seeded(6)).unwrap();
    let b = process.run(&graph, &mut RandomSource::seeded(6)).unwrap();
    assert_eq!(a.log().fingerprint(), b.log().fingerprint());
    assert_eq!(a.newly_infected(), b.newly_infected());
}
