// tests/graph_property.rs

use std::collections::BTreeSet;

use pipedag::dag::Workflow;
use pipedag::step::Step;
use pipedag_test_utils::ProcessBuilder;
use proptest::prelude::*;

// Step i writes out_i.txt and may read any out_j.txt with j < i (acyclic by
// construction) plus some files nobody writes.
fn steps_strategy(max_steps: usize) -> impl Strategy<Value = Vec<(Vec<usize>, Vec<u8>)>> {
    (1..=max_steps).prop_flat_map(|n| {
        proptest::collection::vec(
            (
                proptest::collection::vec(any::<usize>(), 0..4),
                proptest::collection::vec(0u8..3, 0..3),
            ),
            n,
        )
    })
}

fn build_steps(spec: &[(Vec<usize>, Vec<u8>)]) -> Vec<Step> {
    spec.iter()
        .enumerate()
        .map(|(i, (deps, externals))| {
            let mut builder = ProcessBuilder::new(&format!("s{i}")).output("o", &format!("out_{i}.txt"));
            if i > 0 {
                for (k, dep) in deps.iter().enumerate() {
                    builder = builder.input(&format!("d{k}"), &format!("out_{}.txt", dep % i));
                }
            }
            for (k, ext) in externals.iter().enumerate() {
                builder = builder.input(&format!("e{k}"), &format!("ext_{ext}.txt"));
            }
            builder.step()
        })
        .collect()
}

proptest! {
    #[test]
    fn consumers_depend_directly_on_producers(spec in steps_strategy(8)) {
        let wf = Workflow::build(build_steps(&spec)).unwrap();

        for (i, (deps, _)) in spec.iter().enumerate() {
            let name = format!("s{i}");
            let actual = wf.dependencies_of(&name);
            prop_assert!(!actual.contains(&name));
            if i > 0 {
                for dep in deps {
                    let producer = format!("s{}", dep % i);
                    prop_assert!(actual.contains(&producer));
                }
            }
        }
    }

    #[test]
    fn one_file_check_per_external_path(spec in steps_strategy(8)) {
        let wf = Workflow::build(build_steps(&spec)).unwrap();

        let externals: BTreeSet<u8> = spec.iter().flat_map(|(_, e)| e.iter().copied()).collect();
        let checks: Vec<&str> = wf
            .steps()
            .filter(|(_, s)| matches!(s.as_ref(), Step::FileCheck(_)))
            .map(|(n, _)| n)
            .collect();
        prop_assert_eq!(checks.len(), externals.len());
        for ext in externals {
            let check = format!("/work/ext_{ext}.txt");
            prop_assert!(checks.contains(&check.as_str()));
        }
        prop_assert_eq!(wf.len(), spec.len() + checks.len());
    }
}
