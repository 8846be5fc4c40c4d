use petgraph::graph::NodeIndex;

use crate::*;

fn n(i: usize) -> NodeIndex {
    NodeIndex::new(i)
}

fn laid_out(smiles: &str) -> Layout {
    let mut graph = parse_smiles(smiles).unwrap();
    let rings = RingSystem::perceive(&mut graph);
    let mut layout = Layout::new(graph, rings, LayoutOptions::default());
    layout.run();
    layout
}

const PLAIN: &[&str] = &[
    "CCO",
    "CCCCCC",
    "CC(C)C",
    "CC(C)(C)C",
    "CC(=O)O",
    "CCOC(C)=O",
    "C=CC=C",
    "CC#N",
    "c1ccccc1",
    "Cc1ccccc1",
    "c1ccncc1",
    "C1CCCCC1",
    "OC1CCCCC1",
    "c1ccc2ccccc2c1",
    "c1ccc2[nH]ccc2c1",
    "c1ccccc1-c1ccccc1",
    "C1CCC2(CC1)CCC2",
    "CC(C)Cc1ccc(cc1)C(C)C(=O)O",
    "[Na+].[Cl-]",
];

/// Chains entering the ring system at an atom shared by two rings.
const FUSION_SUBSTITUENTS: &[&str] = &[
    "OCC12CCCCC1CCCC2",
    "CC12CCCCC1CCCC2",
    "CC12CCC3C(CCC4=CC(=O)CCC34C)C1CCC2O",
    "C[C@]12CC[C@H]3[C@@H](CCC4=CC(=O)CC[C@@]34C)[C@@H]1CC[C@@H]2O",
];

#[test]
fn cyclohexane_counts() {
    let mut graph = parse_smiles("C1CCCCC1").unwrap();
    let rings = RingSystem::perceive(&mut graph);
    assert_eq!(graph.atom_count(), 6);
    assert_eq!(graph.edge_count(), 6);
    assert_eq!(rings.rings().len(), 1);
    assert_eq!(rings.ring(0).size(), 6);
    assert!(rings.bridged_rings().is_empty());
}

#[test]
fn edge_weight_follows_bond_type() {
    let mut graph = parse_smiles("CC=CC#CC").unwrap();
    for e in graph.edges().collect::<Vec<_>>() {
        let edge = graph.edge(e);
        assert_eq!(edge.weight(), edge.bond_type().weight());
    }
    let e = graph.edge_between(n(0), n(1)).unwrap();
    graph.edge_mut(e).set_bond_type(BondType::Double);
    assert_eq!(graph.edge(e).weight(), 2);
}

#[test]
fn ring_closures_become_edges() {
    let graph = parse_smiles("C1CC2CCC1CC2").unwrap();
    for rc in graph.ring_closures() {
        assert!(Atom::have_common_ringbond(graph.atom(rc.first), graph.atom(rc.second)));
        assert!(graph.edge_between(rc.first, rc.second).is_some());
    }
    let mut graph = graph;
    RingSystem::perceive(&mut graph);
    assert!(graph.atoms().all(|a| graph.atom(a).ringbond_count() == 0));
}

#[test]
fn layout_restores_bridged_rings() {
    let mut graph = parse_smiles("C1CC2CCC1CC2").unwrap();
    let rings = RingSystem::perceive(&mut graph);
    let bridges: Vec<_> = graph.atoms().filter(|&a| graph.atom(a).is_bridge).collect();
    assert_eq!(bridges.len(), 2);
    let original: Vec<Vec<usize>> = graph.atoms().map(|a| graph.atom(a).original_rings.clone()).collect();

    let mut layout = Layout::new(graph, rings, LayoutOptions::default());
    layout.run();
    let restored: Vec<Vec<usize>> = layout
        .graph()
        .atoms()
        .map(|a| layout.graph().atom(a).rings.clone())
        .collect();
    assert_eq!(original, restored);
    assert!(!layout.rings().is_collapsed());
}

#[test]
fn bonds_have_the_configured_length() {
    for smiles in PLAIN {
        let mut graph = parse_smiles(smiles).unwrap();
        let rings = RingSystem::perceive(&mut graph);
        let options = LayoutOptions {
            bond_length: 25.0,
            compact_drawing: false,
            ..LayoutOptions::default()
        };
        let mut layout = Layout::new(graph, rings, options);
        layout.run();
        let g = layout.graph();
        for e in g.edges() {
            let edge = g.edge(e);
            let d = layout.position(edge.source).distance(layout.position(edge.target));
            assert!((d - 25.0).abs() < 1e-6, "{smiles}: {d}");
        }
    }
}

#[test]
fn plain_rings_are_regular() {
    for (smiles, size) in [("C1CCCCC1", 6), ("C1CCCC1", 5), ("C1CCC1", 4), ("C1CCCCCC1", 7)] {
        let layout = laid_out(smiles);
        let expected = vector2::inner_angle(size);
        for i in 0..size {
            let prev = layout.position(n((i + size - 1) % size));
            let here = layout.position(n(i));
            let next = layout.position(n((i + 1) % size));
            let angle = Vector2::angle_between(Vector2::difference(prev, here), Vector2::difference(next, here));
            assert!((angle - expected).abs() < 1e-6, "{smiles} at {i}");
        }
    }
}

#[test]
fn non_bonded_atoms_keep_apart() {
    for smiles in PLAIN.iter().chain(FUSION_SUBSTITUENTS).chain(&["C1CC2CC1CC2", "C1CC2CCC1CC2"]) {
        let layout = laid_out(smiles);
        let g = layout.graph();
        for a in g.atoms() {
            for b in g.atoms().filter(|&b| b > a) {
                if g.edge_between(a, b).is_some() || !g.atom(a).is_drawn || !g.atom(b).is_drawn {
                    continue;
                }
                let d = layout.position(a).distance(layout.position(b));
                assert!(d > 0.5, "{smiles}: atoms {} and {} at {d}", a.index(), b.index());
            }
        }
    }
}

#[test]
fn stereo_is_deterministic() {
    let smiles = "F[C@H](Cl)Br";
    let first = depict(smiles, &LayoutOptions::default()).unwrap();
    for _ in 0..5 {
        assert_eq!(depict(smiles, &LayoutOptions::default()).unwrap(), first);
    }
    assert_ne!(first.atoms[1].chirality, Chirality::None);
}

#[test]
fn implicit_hydrogen_wedges_the_lowest_substituent() {
    // priorities Br > Cl > F > H
    let d = depict("F[C@H](Cl)Br", &LayoutOptions::default()).unwrap();
    let wedged: Vec<_> = d.edges.iter().filter(|e| e.wedge.is_some()).collect();
    assert_eq!(wedged.len(), 1);
    assert_eq!(wedged[0].wedge_origin, Some(1));
    assert_eq!((wedged[0].source, wedged[0].target), (0, 1));
    assert!(d.atoms[1].hydrogen_direction.is_some());
}

#[test]
fn non_isomeric_layout_skips_stereo() {
    let options = LayoutOptions {
        isomeric: false,
        ..LayoutOptions::default()
    };
    let d = depict("F[C@H](Cl)Br", &options).unwrap();
    assert!(d.edges.iter().all(|e| e.wedge.is_none()));
    assert_eq!(d.atoms[1].chirality, Chirality::None);
}

#[test]
fn repeated_pseudo_element_is_counted() {
    let mut atom = Atom::new("C", BondType::Single);
    for _ in 0..3 {
        atom.attach_pseudo_element("F", "C", 0, 0);
    }
    let pseudo: Vec<_> = atom.attached_pseudo_elements().collect();
    assert_eq!(pseudo.len(), 1);
    assert_eq!(pseudo[0].count, 3);
}

#[test]
fn compact_drawing_can_be_disabled() {
    let options = LayoutOptions {
        compact_drawing: false,
        ..LayoutOptions::default()
    };
    let d = depict("CC(F)(F)F", &options).unwrap();
    assert!(d.atoms.iter().all(|a| a.is_drawn));
    assert!(d.atoms[1].pseudo_elements.is_empty());
}

#[test]
fn e_z_survives_the_whole_pipeline() {
    for (smiles, trans) in [("F/C=C/F", true), ("F/C=C\\F", false), ("C/C=C/CCC", true), ("C/C=C\\CCC", false)] {
        let layout = laid_out(smiles);
        let (a, b) = (layout.position(n(1)), layout.position(n(2)));
        let side = layout.position(n(0)).which_side(a, b) * layout.position(n(3)).which_side(a, b);
        assert_eq!(side < 0.0, trans, "{smiles}");
    }
}

#[test]
fn parse_errors_surface_through_depict() {
    let err = depict("C(C", &LayoutOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Parse(ParseError::UnmatchedParen { .. })));
    assert!(depict("", &LayoutOptions::default()).is_err());
}

#[test]
fn unknown_element_is_a_warning() {
    let d = depict("[Xx]C", &LayoutOptions::default()).unwrap();
    assert!(matches!(d.warnings[0], ChemistryWarning::UnknownElement { .. }));
    assert_eq!(d.atoms.len(), 2);
}

#[test]
fn every_position_is_finite() {
    for smiles in PLAIN.iter().chain(&["C1C2CC3CC1CC(C2)C3", "C12C3C4C1C5C3C4C25", "C1CCCCCCCCCCC1"]) {
        let d = depict(smiles, &LayoutOptions::default()).unwrap();
        assert!(d.atoms.iter().all(|a| a.position.is_finite()), "{smiles}");
        assert!(d.rings.iter().all(|r| r.center.is_finite()), "{smiles}");
    }
}
