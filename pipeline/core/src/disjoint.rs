/// Union-find over the indices `0..len`. The smallest index of a set is its root.
#[derive(Clone, Debug)]
pub struct DisjointSets {
    parents: Vec<usize>,
}

impl DisjointSets {
    pub fn new(len: usize) -> Self {
        Self { parents: (0..len).collect() }
    }

    pub fn find(&mut self, mut i: usize) -> usize {
        while self.parents[i] != i {
            self.parents[i] = self.parents[self.parents[i]];
            i = self.parents[i];
        }
        i
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parents[ra.max(rb)] = ra.min(rb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roots_are_smallest_members() {
        let mut sets = DisjointSets::new(6);
        sets.union(4, 2);
        sets.union(5, 4);
        sets.union(3, 1);
        assert_eq!(sets.find(5), 2);
        assert_eq!(sets.find(2), 2);
        assert_eq!(sets.find(3), 1);
        assert_eq!(sets.find(0), 0);
        sets.union(5, 3);
        assert_eq!((1..6).map(|i| sets.find(i)).collect::<Vec<_>>(), vec![1; 5]);
    }
}
