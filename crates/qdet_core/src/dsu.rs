//! Disjoint Set Union (DSU) over boundary generators.
//!
//! Groups generators that share a constraint column so that each connected
//! group can be searched on its own. Generators in different groups can never
//! cancel each other, so splitting keeps every kernel small.

/// Union-find forest with path halving and union by rank.
pub struct UnionFind {
    /// Parent pointer array; roots point to themselves.
    parent: Vec<usize>,

    /// Rank array for union-by-rank heuristic.
    ///
    /// Approximates the depth of each tree to keep merges balanced.
    rank: Vec<u8>,
}

impl UnionFind {
    /// Creates `n` singleton sets.
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Finds the root of the set containing node i, halving the path on the way.
    ///
    /// # Arguments
    ///
    /// * `i` - Node index to find the root for
    ///
    /// # Returns
    ///
    /// The root node index of the set containing i.
    #[inline(always)]
    pub fn find(&mut self, mut i: usize) -> usize {
        while i != self.parent[i] {
            let p = self.parent[i];
            let gp = self.parent[p];
            self.parent[i] = gp;
            i = p;
        }
        i
    }

    /// Merges the sets containing nodes i and j.
    ///
    /// # Returns
    ///
    /// True if the sets were merged, false if they were already united.
    pub fn union(&mut self, i: usize, j: usize) -> bool {
        let (root_i, root_j) = (self.find(i), self.find(j));
        if root_i == root_j {
            return false;
        }
        if self.rank[root_i] < self.rank[root_j] {
            self.parent[root_i] = root_j;
        } else {
            self.parent[root_j] = root_i;
            if self.rank[root_i] == self.rank[root_j] {
                self.rank[root_i] += 1;
            }
        }
        true
    }

    /// All sets, each sorted, ordered by their smallest member.
    pub fn components(&mut self) -> Vec<Vec<usize>> {
        let mut slot_of_root: Vec<Option<usize>> = vec![None; self.len()];
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for i in 0..self.len() {
            let root = self.find(i);
            match slot_of_root[root] {
                Some(slot) => groups[slot].push(i),
                None => {
                    slot_of_root[root] = Some(groups.len());
                    groups.push(vec![i]);
                }
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::UnionFind;

    #[test]
    fn merges_and_groups() {
        let mut uf = UnionFind::new(6);
        assert!(uf.union(4, 1));
        assert!(uf.union(1, 3));
        assert!(!uf.union(3, 4));
        assert!(uf.union(5, 2));
        assert_eq!(uf.find(4), uf.find(3));
        assert_ne!(uf.find(0), uf.find(1));
        assert_eq!(uf.components(), vec![vec![0], vec![1, 3, 4], vec![2, 5]]);
    }

    #[test]
    fn empty_forest_has_no_components() {
        let mut uf = UnionFind::new(0);
        assert!(uf.is_empty());
        assert!(uf.components().is_empty());
    }
}
