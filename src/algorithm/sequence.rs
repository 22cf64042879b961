use crate::algorithm::expand::Expansion;
use crate::error::PlanError;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Construye el grafo de precedencia del conjunto expandido.
///
/// Los corequisitos se colocan juntos, así que el grafo es el cociente por
/// grupos: un nodo por componente de corequisitos (sus miembros, ordenados)
/// y cada arista prerequisito -> dependiente va del grupo de uno al grupo
/// del otro. Las aristas dentro de un mismo grupo se ordenan aparte.
pub fn build_graph(exp: &Expansion) -> (DiGraph<Vec<String>, ()>, HashMap<String, NodeIndex>) {
    let mut graph: DiGraph<Vec<String>, ()> = DiGraph::new();
    let mut node_map: HashMap<String, NodeIndex> = HashMap::new();

    // grupos en orden de su menor código para que el grafo sea determinista
    for cluster in exp.corequisite_clusters() {
        let members: Vec<String> = cluster.into_iter().collect();
        let idx = graph.add_node(members.clone());
        for m in members {
            node_map.insert(m, idx);
        }
    }

    for e in exp.edges.iter() {
        if let (Some(&f), Some(&t)) = (node_map.get(&e.prerequisite), node_map.get(&e.dependent)) {
            // un curso que se exige a sí mismo sigue siendo un ciclo
            if f == t && e.prerequisite != e.dependent {
                continue;
            }
            if graph.find_edge(f, t).is_none() {
                graph.add_edge(f, t, ());
            }
        }
    }

    (graph, node_map)
}

/// Ordena linealmente el conjunto expandido (Kahn): todo prerequisito queda
/// antes de su dependiente y los miembros de un grupo de corequisitos quedan
/// contiguos. Entre nodos listos se toma el menor código, de modo que el
/// orden es reproducible. Con un ciclo devuelve `UnsatisfiableOrdering` con
/// los cursos implicados.
pub fn sequence(exp: &Expansion) -> Result<Vec<String>, PlanError> {
    let (graph, _node_map) = build_graph(exp);

    let groups = kahn(&graph).map_err(|cycle| {
        let courses: BTreeSet<String> = cycle.iter().flat_map(|&n| graph[n].iter().cloned()).collect();
        PlanError::UnsatisfiableOrdering { courses: courses.into_iter().collect() }
    })?;

    let mut order: Vec<String> = Vec::with_capacity(exp.courses.len());
    for idx in groups {
        order.extend(order_within_group(exp, &graph[idx])?);
    }
    Ok(order)
}

/// Orden dentro de un grupo. Sólo cuentan las aristas entre miembros que no
/// van juntos por corequisito directo o transitivo; las demás se resuelven
/// en el mismo trimestre al asignar.
fn order_within_group(exp: &Expansion, members: &[String]) -> Result<Vec<String>, PlanError> {
    if members.len() < 2 {
        return Ok(members.to_vec());
    }
    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut node_map: HashMap<&str, NodeIndex> = HashMap::new();
    for m in members {
        node_map.insert(m.as_str(), graph.add_node(m.clone()));
    }
    for e in exp.edges.iter() {
        let (Some(&f), Some(&t)) = (node_map.get(e.prerequisite.as_str()), node_map.get(e.dependent.as_str())) else {
            continue;
        };
        if exp.corequisite_group(&e.dependent).contains(&e.prerequisite)
            || exp.corequisite_group(&e.prerequisite).contains(&e.dependent)
        {
            continue;
        }
        if graph.find_edge(f, t).is_none() {
            graph.add_edge(f, t, ());
        }
    }

    match kahn(&graph) {
        Ok(nodes) => Ok(nodes.into_iter().map(|n| graph[n].clone()).collect()),
        Err(cycle) => {
            let courses: BTreeSet<String> = cycle.iter().map(|&n| graph[n].clone()).collect();
            Err(PlanError::UnsatisfiableOrdering { courses: courses.into_iter().collect() })
        }
    }
}

/// Kahn con desempate por el peso del nodo. Si queda un ciclo devuelve los
/// nodos que lo forman.
fn kahn<N: Ord + Clone>(graph: &DiGraph<N, ()>) -> Result<Vec<NodeIndex>, Vec<NodeIndex>> {
    let mut indegree: BTreeMap<NodeIndex, usize> = BTreeMap::new();
    for idx in graph.node_indices() {
        indegree.insert(idx, graph.neighbors_directed(idx, Direction::Incoming).count());
    }

    let mut ready: BTreeSet<(N, NodeIndex)> = indegree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(idx, _)| (graph[*idx].clone(), *idx))
        .collect();

    let mut order: Vec<NodeIndex> = Vec::with_capacity(graph.node_count());
    while let Some((_, idx)) = ready.pop_first() {
        order.push(idx);
        for succ in graph.neighbors_directed(idx, Direction::Outgoing) {
            if let Some(d) = indegree.get_mut(&succ) {
                *d -= 1;
                if *d == 0 {
                    ready.insert((graph[succ].clone(), succ));
                }
            }
        }
    }

    if order.len() < graph.node_count() {
        return Err(cycle_members(graph));
    }
    Ok(order)
}

/// Nodos que pertenecen a algún ciclo (componentes fuertemente conexas de
/// más de un nodo, o nodos con lazo propio).
fn cycle_members<N>(graph: &DiGraph<N, ()>) -> Vec<NodeIndex> {
    let mut out: Vec<NodeIndex> = Vec::new();
    for scc in tarjan_scc(graph) {
        let is_cycle = scc.len() > 1 || scc.iter().any(|&n| graph.find_edge(n, n).is_some());
        if is_cycle {
            out.extend(scc);
        }
    }
    out
}
