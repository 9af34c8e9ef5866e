//! Theoretical background.
//!
//! # Contents
//! - [Units](#units)
//! - [Split-operator evolution](#split-operator-evolution)
//! - [Two particles](#two-particles)
//! - [Time-dependent potentials](#time-dependent-potentials)
//! - [Absorbing boundaries](#absorbing-boundaries)
//!
//! # Units
//! Throughout the crate *ħ* = 1, so the time-dependent Schrödinger equation
//! (TDSE) for a single particle of mass *m* in two dimensions reads
//! ```text
//!   ∂ψ       1
//! i -- = - --- (∂²/∂x² + ∂²/∂y²) ψ + V(x, y, t) ψ
//!   ∂t     2 m
//! ```
//! Lengths are measured in the same units as the lattice spacing *δx*,
//! energies in the units returned by the potential, and times in units of
//! *ħ*/energy. Momenta are then wavenumbers, so a packet with mean momentum
//! **p** moves with group velocity **p**/*m*.
//!
//! The lattice holds *nx* × *ny* sites with spacing *δx*; site (*i*, *j*)
//! sits at (*i* *δx*, *j* *δx*), so the domain spans
//! \[0, (*nx* - 1) *δx*\] × \[0, (*ny* - 1) *δx*\].
//!
//! # Split-operator evolution
//! The Hamiltonian is the sum of a kinetic part *T*, diagonal in momentum
//! space, and a potential part *V*, diagonal in position space:
//! ```text
//!   ∂ψ
//! i -- = (T + V) ψ
//!   ∂t
//!
//!      k²
//! T = ---
//!     2 m
//! ```
//! Exponentiating the two parts separately discards their commutator. Doing so
//! naively costs an *O*(*dt*²) error per step, but sandwiching the kinetic step
//! between two half-sized potential steps cancels the leading term (Strang
//! splitting):
//! ```text
//!               -i V dt/2  -i T dt  -i V dt/2
//! ψ(t + dt) = [e          e        e         ] ψ(t) + O(dt³)
//! ```
//! Each factor is then a pointwise phase in the space where its operator is
//! diagonal, and the fast Fourier transform moves between the two:
//! ```text
//!        ψ(t, r)
//!           |
//!           V
//!     -i V dt/2
//!    e
//!           |
//!           '--> FFT ---.
//!                       |
//!                       V
//!                    -i k² dt/2m
//!                   e
//!                       |
//!           .-- iFFT <--'
//!           |
//!           V
//!     -i V' dt/2
//!    e
//!           |
//!           V
//!      damping
//!           |
//!           V
//!     ψ(t + dt, r)
//! ```
//! Every factor has unit modulus, so without damping the scheme conserves the
//! norm to rounding error regardless of step size. Accuracy, however, requires
//! both *V* *dt* and *k*²*dt*/2*m* (at the largest lattice wavenumber π/*δx*) to
//! be small compared to 2π.
//!
//! Because the discrete Fourier transform treats the lattice as periodic,
//! wavenumbers follow FFT ordering: index 0 is *k* = 0, and indices past the
//! Nyquist index wrap around to negative *k*.
//!
//! # Two particles
//! Two particles in two dimensions live in a four-dimensional configuration
//! space (*x*₁, *y*₁, *x*₂, *y*₂), and the wavefunction is stored on a
//! four-axis lattice. Nothing about the method changes: the FFT is applied
//! along all four axes, the kinetic phase becomes
//! ```text
//!    |k₁|²   |k₂|²
//! - (----- + -----) dt
//!    2 m₁    2 m₂
//! ```
//! and the potential on each lattice site is
//! ```text
//! V(r₁; m₁) + V(r₂; m₂) + U(r₁, r₂)
//! ```
//! with *U* an optional interaction such as a softened Coulomb repulsion.
//! Memory grows as (*nx* *ny*)², so two-particle runs are limited to modest
//! lattices.
//!
//! # Time-dependent potentials
//! When *V* depends on time, the two half steps may use the potential at
//! different instants. The choices offered by
//! [`PotentialSampling`][crate::config::PotentialSampling] are
//! - *V*(*t* + *dt*/2) for both halves (the midpoint rule, which keeps the
//!   *O*(*dt*³) local error for smooth time dependence);
//! - *V*(*t*) for the first half and *V*(*t* + *dt*) for the second, carrying
//!   the latter over to the next step so that each step samples only once;
//! - *V*(*t*) for both halves;
//! - *V*(0) for every step, for potentials known to be static.
//!
//! # Absorbing boundaries
//! The periodicity that makes the FFT convenient also means that a packet
//! leaving one side of the domain re-enters from the other. To emulate an open
//! domain, the wavefunction is multiplied after every step by a mask that
//! falls off smoothly within *w* sites of any edge:
//! ```text
//!            f        π d
//! s(d) = 1 - - (1 + cos ---),  d < w
//!            2          w
//! ```
//! where *d* is the distance to the nearest edge and *f* the attenuation at
//! the edge itself. The mask is applied once per step, so the effective
//! absorption per unit time depends on *dt*; probability absorbed this way is
//! simply lost and the norm decays accordingly.
